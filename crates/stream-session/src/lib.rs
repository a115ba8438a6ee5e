//! Playback session core for the Icecast stream player.
//!
//! Everything here is synchronous except the probe and the stats fetcher.
//! The host feeds [`SessionEvent`]s into [`SessionManager::dispatch`] and
//! implements the seams: [`MediaElement`], [`TimerScheduler`],
//! [`DisplayAdapter`] and [`Clock`].
pub mod clock;
pub mod display;
pub mod error;
pub mod event;
pub mod health;
pub mod media;
pub mod metadata;
pub mod probe;
pub mod reconnect;
pub mod session;
pub mod timer;
pub mod url;

pub use clock::{Clock, ManualClock, SystemClock};
pub use display::{DisplayAdapter, LogDisplay};
pub use error::SessionError;
pub use event::{SessionEvent, UserAction};
pub use media::{MediaElement, MediaErrorCode, MediaEvent, MediaState, PlayError};
pub use probe::{AvailabilityProbe, HttpProbe};
pub use session::{ProbeRequest, SessionManager};
pub use timer::{TimerId, TimerKind, TimerScheduler};
