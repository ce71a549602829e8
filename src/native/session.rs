//! Session establishment and teardown.
//!
//! Opening a session chains several native calls: environment creation,
//! error/server handle allocation, server attach, service context setup,
//! session begin and the optional non-blocking switch. Any failure tears
//! down whatever was already allocated before the error is returned.

use super::constants::DEFAULT_FETCH_SIZE;
use super::{check, native_error, Attribute, CallInterface, EnvMode, Handle, HandleType};
use crate::error::{Error, Result};
use std::fmt;
use tracing::{debug, warn};

/// Connection parameters.
#[derive(Clone)]
pub struct ConnectParams {
    /// Service name (or TNS alias) the server handle attaches to.
    pub service_name: String,
    pub username: String,
    pub password: String,
    /// Environment creation mode.
    pub env_mode: EnvMode,
    /// Switch the server handle to non-blocking mode after logon.
    pub non_blocking: bool,
    /// Default row-batch size for result sets.
    pub fetch_size: u32,
    /// Program name reported to the server.
    pub program: String,
}

impl ConnectParams {
    /// Create new connection parameters.
    pub fn new(
        service_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            username: username.into(),
            password: password.into(),
            env_mode: EnvMode::Object,
            non_blocking: false,
            fetch_size: DEFAULT_FETCH_SIZE,
            program: env!("CARGO_PKG_NAME").to_string(),
        }
    }

    /// Set the default row-batch size. Zero is treated as one.
    ///
    /// # Example
    ///
    /// ```
    /// use oracle_bound_rs::ConnectParams;
    ///
    /// let params = ConnectParams::new("ORCL", "scott", "tiger").with_fetch_size(500);
    /// assert_eq!(params.fetch_size, 500);
    /// ```
    pub fn with_fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }

    pub fn with_non_blocking(mut self, non_blocking: bool) -> Self {
        self.non_blocking = non_blocking;
        self
    }

    pub fn with_env_mode(mut self, env_mode: EnvMode) -> Self {
        self.env_mode = env_mode;
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("service_name", &self.service_name)
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .field("env_mode", &self.env_mode)
            .field("non_blocking", &self.non_blocking)
            .field("fetch_size", &self.fetch_size)
            .field("program", &self.program)
            .finish()
    }
}

/// Client identification sent as session attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub program: String,
    pub machine: String,
    pub os_user: String,
    pub pid: u32,
}

impl ClientInfo {
    /// Identify the local process.
    ///
    /// # Errors
    /// Returns `Error::OsApiFailed` if the host name cannot be read.
    pub fn local(program: &str) -> Result<Self> {
        let machine = hostname::get()
            .map_err(Error::os_api)?
            .to_string_lossy()
            .to_string();
        Ok(Self {
            program: program.to_string(),
            machine,
            os_user: whoami::username(),
            pid: std::process::id(),
        })
    }

    /// Identification used when the host name is unavailable.
    pub fn unknown(program: &str) -> Self {
        Self {
            program: program.to_string(),
            machine: "unknown".to_string(),
            os_user: whoami::username(),
            pid: std::process::id(),
        }
    }

    /// Value of the client-info session attribute.
    pub fn client_info(&self) -> String {
        format!("machine={};osuser={};pid={}", self.machine, self.os_user, self.pid)
    }
}

/// Native handles of one session, in allocation order.
#[derive(Debug, Default)]
pub(crate) struct SessionHandles {
    env: Option<Handle>,
    error: Option<Handle>,
    server: Option<Handle>,
    service: Option<Handle>,
    session: Option<Handle>,
    attached: bool,
    logged_on: bool,
    non_blocking: bool,
}

impl SessionHandles {
    /// Run the logon chain. On failure every handle allocated so far is released.
    pub(crate) fn open(
        ci: &dyn CallInterface,
        params: &ConnectParams,
        client: &ClientInfo,
    ) -> Result<Self> {
        let mut handles = SessionHandles::default();
        match handles.establish(ci, params, client) {
            Ok(()) => Ok(handles),
            Err(err) => {
                if let Err(teardown) = handles.close(ci) {
                    warn!(error = %teardown, "teardown after failed logon also failed");
                }
                Err(err)
            }
        }
    }

    fn establish(
        &mut self,
        ci: &dyn CallInterface,
        params: &ConnectParams,
        client: &ClientInfo,
    ) -> Result<()> {
        let env = ci
            .env_create(params.env_mode)
            .map_err(Error::environment_create_failed)?;
        self.env = Some(env);

        let err = ci
            .handle_alloc(env, HandleType::Error)
            .map_err(|status| native_error(ci, env, status))?;
        self.error = Some(err);

        let alloc = |kind| {
            ci.handle_alloc(env, kind)
                .map_err(|status| native_error(ci, env, status))
        };

        let server = alloc(HandleType::Server)?;
        self.server = Some(server);
        check(ci, err, ci.server_attach(server, err, &params.service_name))?;
        self.attached = true;
        debug!(service = %params.service_name, "server attached");

        let service = alloc(HandleType::ServiceContext)?;
        self.service = Some(service);
        check(ci, err, ci.attr_set(service, Attribute::Server(server), err))?;

        let session = alloc(HandleType::Session)?;
        self.session = Some(session);
        check(ci, err, ci.attr_set(session, Attribute::Username(&params.username), err))?;
        check(ci, err, ci.attr_set(session, Attribute::Password(&params.password), err))?;
        check(ci, err, ci.attr_set(session, Attribute::Module(&client.program), err))?;
        check(ci, err, ci.attr_set(session, Attribute::ClientInfo(&client.client_info()), err))?;
        check(ci, err, ci.session_begin(service, err, session))?;
        self.logged_on = true;
        check(ci, err, ci.attr_set(service, Attribute::Session(session), err))?;
        debug!(username = %params.username, "session started");

        if params.non_blocking {
            check(ci, err, ci.attr_set(server, Attribute::NonBlockingMode(true), err))?;
            self.non_blocking = true;
        }
        Ok(())
    }

    /// End the session and free every handle. Safe to call more than once.
    ///
    /// All steps run even if one fails; the first failure is returned.
    pub(crate) fn close(&mut self, ci: &dyn CallInterface) -> Result<()> {
        let mut first_error: Option<Error> = None;
        let mut note = |result: Result<()>| {
            if let Err(err) = result {
                warn!(error = %err, "session teardown step failed");
                first_error.get_or_insert(err);
            }
        };

        if let (Some(err), Some(server)) = (self.error, self.server) {
            if self.non_blocking {
                note(check(ci, err, ci.attr_set(server, Attribute::NonBlockingMode(false), err)));
                self.non_blocking = false;
            }
            if self.logged_on {
                if let (Some(service), Some(session)) = (self.service, self.session) {
                    note(check(ci, err, ci.session_end(service, err, session)));
                }
                self.logged_on = false;
            }
            if self.attached {
                note(check(ci, err, ci.server_detach(server, err)));
                self.attached = false;
            }
        }

        for handle in [
            self.session.take(),
            self.service.take(),
            self.server.take(),
            self.error.take(),
            self.env.take(),
        ]
        .into_iter()
        .flatten()
        {
            let status = ci.handle_free(handle);
            if !status.is_success() {
                note(Err(Error::native(status, 0, format!("freeing {:?} handle", handle.kind()))));
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.logged_on
    }

    pub(crate) fn is_non_blocking(&self) -> bool {
        self.non_blocking
    }

    pub(crate) fn env(&self) -> Result<Handle> {
        self.env.ok_or_else(|| Error::internal("connection is closed"))
    }

    pub(crate) fn error(&self) -> Result<Handle> {
        self.error.ok_or_else(|| Error::internal("connection is closed"))
    }

    pub(crate) fn service(&self) -> Result<Handle> {
        self.service.ok_or_else(|| Error::internal("connection is closed"))
    }
}
