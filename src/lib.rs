//! rootwise - Guided Root-Cause Reflection Engine
//!
//! An LLM-backed engine that walks a user from a vague problem statement
//! to a root cause and a concrete action plan through adaptive Socratic
//! questioning. Every stage of the reflection flow maps to one engine
//! operation, gated by per-stage quotas and logged to a local SQLite
//! ledger with token counts and cost.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rootwise::{
//!     db, AnthropicClient, GatewayConfig, LlmGateway, RandomPicker,
//!     SessionEngine, Stage, StageRequest,
//! };
//! use std::sync::Arc;
//!
//! let conn = db::init_db(&db_path)?;
//! let config = GatewayConfig::default();
//! let client = AnthropicClient::new(&config)?;
//! let gateway = LlmGateway::new(Arc::new(client), config);
//! let picker = RandomPicker;
//! let engine = SessionEngine::new(&conn, &gateway, &picker);
//!
//! let reply = engine.respond(&request).await?;
//! let summary = engine.summarize(&user_id, &session_id, &context).await?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 SessionEngine                     │
//! │  respond()  quota gate → stage redirect → route   │
//! │  summarize()  structured end-of-session summary   │
//! └────────┬───────────────┬───────────────┬─────────┘
//!          │               │               │
//!   prompt templates  conversation     fear analysis
//!   (static stages)   controllers      (two halves)
//!          │          ┌────┴─────┐          │
//!          │     cause analysis  │          │
//!          │     action planning │          │
//!          └───────────┬─────────┴──────────┘
//!                      ▼
//!               LlmGateway (metered)
//!                      ▼
//!            Anthropic Messages API
//! ```

pub mod action_planning;
pub mod cause_analysis;
pub mod config;
pub mod context;
pub mod db;
pub mod detectors;
pub mod dispatcher;
pub mod evaluator;
pub mod fears;
pub mod gateway;
pub mod jsonx;
pub mod limits;
pub mod summary;
pub mod templates;
pub mod types;

// Engine front door
pub use dispatcher::SessionEngine;
pub use types::*;

// Gateway
pub use config::{ConversationTuning, GatewayConfig, QuotaConfig};
pub use gateway::{AnthropicClient, Completion, LlmClient, LlmGateway, LlmRequest};

// Conversation controllers
pub use action_planning::{ActionPlanningController, ActionPlanningInput};
pub use cause_analysis::CauseAnalysisController;
pub use evaluator::{analyze_self_awareness, validate_problem_statement, DepthEvaluator};

// Fear analysis
pub use fears::fear_analysis_options;

// Rate limiting and logging
pub use db::init_db;
pub use limits::check_rate_limits;

// Session summary
pub use summary::{analyze_interactions, InteractionAnalysis, SessionSummary};

// Prompt texture
pub use templates::{FixedPicker, PhrasePicker, RandomPicker};
