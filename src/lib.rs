//! A W3C SCXML state chart interpreter core: document model, the optimal
//! enabled transition set algorithm, microstep/macrostep execution,
//! parallel regions, and shallow/deep history.
//!
//! The crate is organized around a single owning document (`document`,
//! `builder`) referenced everywhere else by small `Copy` ids (`ids`),
//! collaborator traits at the seams where a host must supply behavior the
//! engine itself can't know (`datamodel`, `actions`), and a driver
//! (`interpreter`) that owns nothing but the running state and pulls the
//! rest together.
//!
//! Datamodel expressions, action effects, and event transport are all
//! consumed through traits (`datamodel::ExpressionEvaluator`,
//! `actions::ActionEffector`) rather than hard-wired to a scripting engine
//! or a wire protocol: the engine's job ends at deciding which
//! transitions fire and in what order entry/exit actions run.

pub mod actions;
pub mod builder;
pub mod config;
pub mod configuration;
pub mod datamodel;
pub mod document;
pub mod domain;
pub mod error;
pub mod event;
pub mod history;
pub mod ids;
pub mod interpreter;
pub mod microstep;
pub mod prelude;
pub mod selector;
