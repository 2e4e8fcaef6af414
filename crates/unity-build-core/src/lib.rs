//! Build orchestration for Unity projects.
//!
//! A build attempt resolves the next artifact version from the output folder,
//! decides between a headless batchmode run and a file handshake with an
//! already-open editor, deploys the matching editor helper script and
//! reports a single [`BuildOutcome`].

pub mod batchmode;
pub mod config;
pub mod deployer;
pub mod error;
pub mod focus;
pub mod handshake;
pub mod locator;
pub mod mode;
pub mod orchestrator;
pub mod outcome;
pub mod telemetry;
pub mod version;

pub use batchmode::{BatchmodeCommand, BatchmodeExecutor, BatchmodeRequest};
pub use config::BuildConfig;
pub use deployer::{DeployedScript, ScriptDeployer, ScriptKind};
pub use error::{BuildError, Result};
pub use handshake::{
    HandshakeCoordinator, HandshakeRequest, HandshakeResult, HandshakeSettings, HandshakeState,
};
pub use locator::{
    load_editors_cache, save_editors_cache, search_for_editors, EditorLocator, HubLayoutLocator,
    EDITORS_CACHE_FILENAME,
};
pub use mode::{detect_mode, BuildMode, ConfiguredMode, ModeDecision};
pub use orchestrator::{BuildOrchestrator, BuildPlan, PlannedAction};
pub use outcome::BuildOutcome;
pub use telemetry::init_tracing;
pub use version::{resolve_version, IncrementKind, SemanticVersion};
