//! Client-side session controller for the story service.

pub mod controller;
pub mod error;
pub mod form;
pub mod gateway;
pub mod locale;
pub mod presets;
pub mod roster;
pub mod session;
pub mod settings;
pub mod view;

pub use controller::{ActionController, ActionOutcome, Confirm, ControllerOptions};
pub use error::{GatewayError, GatewayResult, SessionStateError, SettingsError};
pub use gateway::{HttpSessionGateway, SessionGateway};
pub use locale::Locale;
pub use settings::{ClientSettings, GenerationFlow, Preferences, RouteStyle};
pub use view::SessionView;
