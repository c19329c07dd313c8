//! Canned form templates.

use crate::{form::StoryForm, roster::RosterStore};

pub struct Preset {
    pub key: &'static str,
    pub genre: &'static str,
    pub tone: &'static str,
    pub age: &'static str,
    pub length: &'static str,
    pub setting: &'static str,
    pub theme: &'static str,
    pub idea: &'static str,
    pub characters: [(&'static str, &'static str); 2],
}

/// Characters a fresh roster starts with.
pub const DEFAULT_CHARACTERS: [(&str, &str); 2] = [
    ("มะลิ", "ใจดี ช่างสงสัย กล้าหาญนิดๆ"),
    ("ต้นน้ำ", "เพื่อนสนิท อารมณ์ดี ชอบช่วยคน"),
];

pub const PRESETS: [Preset; 4] = [
    Preset {
        key: "bedtime",
        genre: "bedtime",
        tone: "warm",
        age: "kids",
        length: "short",
        setting: "ห้องนอนอุ่นๆในคืนฝนพรำ",
        theme: "ความกล้าหาญเล็กๆก่อนนอน",
        idea: "เด็กคนหนึ่งกลัวเสียงฟ้าร้อง แล้วได้เรียนรู้วิธีทำให้ใจสงบ",
        characters: [
            ("น้องพลอย", "ขี้กลัวนิดๆ แต่ใจดี"),
            ("น้องหมี", "ตุ๊กตาหมีพูดได้ ชอบปลอบใจ"),
        ],
    },
    Preset {
        key: "adventure",
        genre: "adventure",
        tone: "funny",
        age: "preteens",
        length: "medium",
        setting: "เกาะลึกลับกลางทะเล",
        theme: "มิตรภาพและการแก้ปัญหา",
        idea: "ทีมเพื่อนออกตามหาของวิเศษในเกาะลึกลับ แต่ต้องผ่านด่านปริศนา",
        characters: DEFAULT_CHARACTERS,
    },
    Preset {
        key: "mystery",
        genre: "detective",
        tone: "mystery",
        age: "teens",
        length: "medium",
        setting: "โรงเรียนเก่าแก่ที่มีข่าวลือ",
        theme: "ความจริงสำคัญกว่าความเชื่อ",
        idea: "เกิดเหตุของหายลึกลับในโรงเรียน ทุกคนสงสัยผี แต่จริงๆมีคนอยู่เบื้องหลัง",
        characters: [("เรย์", "ช่างสังเกต ชอบตั้งคำถาม"), ("มิน", "สายเทค ช่วยหาหลักฐาน")],
    },
    Preset {
        key: "slice",
        genre: "slice",
        tone: "warm",
        age: "adult",
        length: "short",
        setting: "คาเฟ่เล็กๆริมถนน",
        theme: "การเริ่มต้นใหม่",
        idea: "วันธรรมดาในคาเฟ่ที่เปลี่ยนชีวิตคนหนึ่งให้กลับมามีหวัง",
        characters: [
            ("ฟ้า", "เจ้าของคาเฟ่ที่กำลังท้อ"),
            ("ปั้น", "ลูกค้าที่มาพร้อมคำพูดให้กำลังใจ"),
        ],
    },
];

pub fn find(key: &str) -> Option<&'static Preset> {
    let key = key.trim();
    PRESETS.iter().find(|preset| preset.key.eq_ignore_ascii_case(key))
}

impl Preset {
    /// Overwrites the preset's form fields, swaps in its characters and drops the outline draft.
    /// Relationships, direction and illustration options are left as they were.
    pub fn apply(&self, form: &mut StoryForm, roster: &mut RosterStore) {
        form.genre = self.genre.into();
        form.tone = self.tone.into();
        form.age = self.age.into();
        form.length = self.length.into();
        form.setting = self.setting.into();
        form.theme = self.theme.into();
        form.idea = self.idea.into();
        form.outline.clear();

        roster.clear();
        for (name, traits) in self.characters {
            roster.add(name, traits);
        }
    }
}

pub fn seed_default_roster(roster: &mut RosterStore) {
    for (name, traits) in DEFAULT_CHARACTERS {
        roster.add(name, traits);
    }
}

#[cfg(test)]
#[path = "tests/presets_tests.rs"]
mod tests;
