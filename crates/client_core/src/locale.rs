//! User-facing text catalogs.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use shared::domain::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    En,
    Th,
}

impl Locale {
    pub fn catalog(self) -> &'static Catalog {
        match self {
            Locale::En => &EN,
            Locale::Th => &TH,
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Locale::En => "en",
            Locale::Th => "th",
        })
    }
}

impl FromStr for Locale {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "th" => Ok(Locale::Th),
            other => Err(UnknownVariant {
                kind: "locale",
                value: other.to_string(),
            }),
        }
    }
}

pub struct Catalog {
    pub none_yet: &'static str,
    pub loading: &'static str,
    pub advancing: &'static str,
    pub illustrating: &'static str,
    pub unreachable: &'static str,
    pub malformed: &'static str,
    pub generating_story: &'static str,
    pub generating_outline: &'static str,
    pub outline_ready: &'static str,
    pub story_ready: &'static str,
    pub deleting: &'static str,
    pub deleted: &'static str,
    pub confirm_delete: &'static str,
}

static EN: Catalog = Catalog {
    none_yet: "(none yet)",
    loading: "(loading...)",
    advancing: "(writing the next chapter...)",
    illustrating: "Drawing the illustration...",
    unreachable: "Cannot reach the server",
    malformed: "Unexpected response from the server",
    generating_story: "Generating...",
    generating_outline: "Generating outline...",
    outline_ready: "Outline ready ✓ (editable)",
    story_ready: "Story ready",
    deleting: "Deleting...",
    deleted: "Deleted",
    confirm_delete: "Delete this story permanently?",
};

static TH: Catalog = Catalog {
    none_yet: "(ยังไม่มี)",
    loading: "(กำลังโหลด...)",
    advancing: "(กำลังสร้างตอนถัดไป...)",
    illustrating: "กำลังสร้างภาพอนิเมะ...",
    unreachable: "เชื่อมต่อเซิร์ฟเวอร์ไม่ได้",
    malformed: "เซิร์ฟเวอร์ตอบกลับผิดรูปแบบ",
    generating_story: "Generating...",
    generating_outline: "Generating outline...",
    outline_ready: "Outline ready ✓ (แก้ไขได้)",
    story_ready: "เรื่องพร้อมแล้ว",
    deleting: "กำลังลบ...",
    deleted: "ลบแล้ว",
    confirm_delete: "ลบเรื่องนี้ถาวรหรือไม่?",
};
