//! # Resource Graph Client
//!
//! Talks to the machine-wide resource graph database engine from analysis
//! code. A [`Database`] discovers (or launches) the engine, resolves which
//! project and root container the session may operate on, and hands out
//! [`Container`] and [`Asset`] values whose relationships are fetched lazily.
//!
//! ## Session modes
//!
//! - **Interactive**: neither `RESGRAPH_PROJECT_ID` nor `RESGRAPH_CONTAINER`
//!   is set. The caller names the root container's folder; the graph may be
//!   edited while the session is alive, so asset lists are refetched on
//!   every access.
//! - **Managed**: both are set by the runner. The graph is frozen for the
//!   run and relationships are cached after the first fetch.
//!
//! ## Threads
//!
//! A `Database` owns one strictly alternating request/reply channel and is
//! not `Send`. Use [`Database::try_clone`] or [`Database::detach`] to get an
//! independent channel for another thread.
//!
//! ```no_run
//! use resgraph_client::{Database, InitOptions, NewAsset, ResourceFilter};
//!
//! let db = Database::new(InitOptions::interactive("/home/u/proj/data/expA"))?;
//! for trial in db.find_containers(&ResourceFilter::new().kind("trial"))? {
//!     for asset in trial.assets()? {
//!         println!("{}", asset.file().display());
//!     }
//! }
//! let out = db.add_asset("out/summary.csv", NewAsset::new().tags(["summary"]))?;
//! std::fs::write(out, "...")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod channel;
pub mod config;
pub mod context;
pub mod database;
pub mod discovery;
pub mod error;
pub mod journal;
pub mod resources;
pub mod search;

pub use cache::Cached;
pub use channel::{Channel, Connector, TcpConnector, TcpTransport, Transport};
pub use config::{ClientConfig, EnvSignals, InitOptions};
pub use context::{SessionContext, SessionMode};
pub use database::{Database, SessionHandle};
pub use error::{ConnectivityError, Error, Result};
pub use journal::{AssetJournal, JournalRecord, JournalUpdate, NewAsset};
pub use resources::{Asset, Container, Resource};
pub use search::ResourceFilter;

pub use resgraph_filter as filter;
pub use resgraph_protocol as protocol;
