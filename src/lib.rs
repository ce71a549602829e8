//! Row-oriented Oracle client over the native call-level interface.
//!
//! The crate drives an implementation of [`CallInterface`] and hides handle
//! lifecycles, type conversion and batch fetching behind five types:
//! [`Connection`], [`Statement`], [`Parameter`], [`ResultSet`] and [`Column`].
//!
//! Values travel through bound buffers. Each output column owns one buffer
//! holding a whole fetch batch; each parameter owns a single-row buffer. The
//! native layer only ever sees borrowed views of them during an execute or
//! fetch call.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use oracle_bound_rs::native::sim::{SimInterface, SimScript};
//! use oracle_bound_rs::{ConnectParams, Connection, Result};
//!
//! fn main() -> Result<()> {
//!     let sim = Rc::new(SimInterface::new());
//!     sim.register(
//!         "BEGIN :sGreeting := 'hello ' || :sName; END;",
//!         SimScript::block().out(":sGreeting", "hello world"),
//!     );
//!
//!     let mut conn = Connection::open(sim, &ConnectParams::new("ORCL", "scott", "tiger"))?;
//!     {
//!         let mut stmt = conn.prepare("BEGIN :sGreeting := 'hello ' || :sName; END;")?;
//!         stmt.bind(":sGreeting")?;
//!         stmt.bind(":sName")?.set_text("world")?;
//!         stmt.execute()?;
//!         assert_eq!(stmt.parameter(":sGreeting")?.to_text()?, "hello world");
//!     }
//!     conn.close()?;
//!     Ok(())
//! }
//! ```

pub mod column;
pub mod connection;
pub mod error;
pub mod native;
pub mod parameter;
pub mod result_set;
pub mod statement;

pub use column::{Column, ColumnValue};
pub use connection::Connection;
pub use error::{Error, ErrorType, Result};
pub use native::session::{ClientInfo, ConnectParams};
pub use native::types::{OracleValue, ValueKind};
pub use native::{CallInterface, EnvMode, Status};
pub use parameter::Parameter;
pub use result_set::{ColumnIndex, HandleOwner, ResultSet};
pub use statement::{ParameterIndex, Statement, StatementType};
