//! System adapters: one capability set per external system, spoken in the
//! canonical vocabulary of `tasklink-core`.
//!
//! ```text
//! SystemAdapter (adapter.rs)
//!   ├── GeminiAdapter<S: GeminiService>   gemini/
//!   └── PureCmAdapter<S: PureCmService>   purecm/
//!
//! GeminiService / PureCmService: one method per remote call
//!   ├── Http*   (ureq, JSON over HTTP)
//!   └── Memory* (in-process, for tests and dry runs)
//! ```

pub mod adapter;
pub mod error;
pub mod gemini;
mod http;
pub mod memory;
pub mod model;
pub mod purecm;

pub use adapter::{ProjectStore, SystemAdapter, TaskStore, UserStore, VersionStore};
pub use error::{AdapterError, AdapterResult, ServiceError, ServiceResult};
pub use gemini::{GeminiAdapter, GeminiService, HttpGeminiService};
pub use memory::{Clock, MemoryGemini, MemoryPureCm};
pub use model::{ChangeItem, ChangeKind, ChangeSubmission, NewTask, Project, Task, User, Version};
pub use purecm::{HttpPureCmService, PureCmAdapter, PureCmService};
