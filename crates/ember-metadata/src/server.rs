//! Servers, their databases and administrative service sessions

use ember_core::{EmberError, Identifier, Result};
use uuid::Uuid;

use crate::database::Database;
use crate::item::{FacetKind, ItemKind, MetadataItem};
use crate::service::{ProgressIndicator, ServiceConnector, ServiceSession, User};
use crate::visitor::{MetadataItemVisitor, MetadataNode};

const SYSDBA: &str = "SYSDBA";

fn is_sysdba(username: &str) -> bool {
    username.to_uppercase() == SYSDBA
}

#[derive(Debug)]
pub struct Server {
    item: MetadataItem,
    hostname: String,
    port: String,
    databases: Vec<Database>,
    service_user: String,
    service_password: String,
    service_sysdba_password: String,
    users: Vec<User>,
}

/// Login tried against the service manager, with where it came from
struct Candidate {
    username: String,
    password: String,
    source: String,
}

/// Optional progress sink
struct Progress<'a>(Option<&'a mut dyn ProgressIndicator>);

impl Progress<'_> {
    fn init(&mut self, message: &str, steps: usize) {
        if let Some(p) = self.0.as_deref_mut() {
            p.init_progress(message, steps);
        }
    }

    fn step(&mut self, message: &str) {
        if let Some(p) = self.0.as_deref_mut() {
            p.set_progress_message(message);
            p.step_progress();
        }
    }

    fn is_canceled(&self) -> bool {
        self.0.as_deref().is_some_and(|p| p.is_canceled())
    }
}

impl Server {
    /// A server named after its host
    pub fn new(hostname: impl Into<String>, port: impl Into<String>) -> Self {
        let hostname = hostname.into();
        Self {
            item: MetadataItem::new(ItemKind::Server, Identifier::new(hostname.as_str())),
            hostname,
            port: port.into(),
            databases: Vec::new(),
            service_user: String::new(),
            service_password: String::new(),
            service_sysdba_password: String::new(),
            users: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<Identifier>) -> Self {
        self.item.set_name(name);
        self
    }

    pub fn id(&self) -> Uuid {
        self.item.id()
    }

    pub fn name(&self) -> &Identifier {
        self.item.name()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn set_hostname(&mut self, hostname: impl Into<String>) {
        self.hostname = hostname.into();
        self.item.notify_observers();
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn set_port(&mut self, port: impl Into<String>) {
        self.port = port.into();
        self.item.notify_observers();
    }

    /// `host/port` when both are set, otherwise the host alone
    pub fn make_connection_string(hostname: &str, port: &str) -> String {
        if !hostname.is_empty() && !port.is_empty() {
            format!("{}/{}", hostname, port)
        } else {
            hostname.to_string()
        }
    }

    pub fn connection_string(&self) -> String {
        Self::make_connection_string(&self.hostname, &self.port)
    }

    pub fn add_database(&mut self, mut database: Database) -> &mut Database {
        database.set_server(Some(self.id()));
        self.databases.push(database);
        self.item.notify_observers();
        let last = self.databases.len() - 1;
        &mut self.databases[last]
    }

    /// Remove and return the database with `id`. Observers are only
    /// notified when something was removed.
    pub fn remove_database(&mut self, id: Uuid) -> Option<Database> {
        let position = self.databases.iter().position(|d| d.id() == id)?;
        let mut database = self.databases.remove(position);
        database.set_server(None);
        self.item.notify_observers();
        Some(database)
    }

    pub fn databases(&self) -> &[Database] {
        &self.databases
    }

    pub fn databases_mut(&mut self) -> &mut [Database] {
        &mut self.databases
    }

    pub fn find_database_mut(&mut self, id: Uuid) -> Option<&mut Database> {
        self.databases.iter_mut().find(|d| d.id() == id)
    }

    pub fn has_connected_database(&self) -> bool {
        self.databases.iter().any(Database::is_connected)
    }

    /// Suppress notifications of every database until [`Server::unlock_children`]
    pub fn lock_children(&self) {
        for database in &self.databases {
            database.item().subject().lock();
        }
    }

    pub fn unlock_children(&self) {
        for database in &self.databases {
            database.item().subject().unlock();
        }
    }

    pub fn service_user(&self) -> &str {
        &self.service_user
    }

    pub fn service_password(&self) -> &str {
        &self.service_password
    }

    pub fn service_sysdba_password(&self) -> &str {
        &self.service_sysdba_password
    }

    /// Remember a non-SYSDBA login that worked for the service manager
    pub fn set_service_credentials(&mut self, username: impl Into<String>, password: impl Into<String>) {
        self.service_user = username.into();
        self.service_password = password.into();
    }

    pub fn set_service_sysdba_password(&mut self, password: impl Into<String>) {
        self.service_sysdba_password = password.into();
    }

    /// Open a service session with credentials already known to the
    /// application.
    ///
    /// Tries, in order: the cached SYSDBA password, the cached service
    /// login (unless `sysdba` is required), the logins of connected
    /// databases, then the stored logins of disconnected ones. A cached
    /// login that fails is forgotten; a database login that works is
    /// cached. With `sysdba` set only SYSDBA logins are tried.
    ///
    /// # Errors
    /// `EmberError::Cancelled` when `progress` reports cancellation between
    /// attempts, `EmberError::Connection` when every candidate failed.
    #[tracing::instrument(skip(self, connector, progress), fields(server = %self.connection_string()))]
    pub fn get_service(
        &mut self,
        connector: &dyn ServiceConnector,
        progress: Option<&mut dyn ProgressIndicator>,
        sysdba: bool,
    ) -> Result<Box<dyn ServiceSession>> {
        let mut progress = Progress(progress);
        let connection_string = self.connection_string();
        progress.init("Connecting...", self.databases.len() + 2);

        if !self.service_sysdba_password.is_empty() {
            progress.step("Using current SYSDBA password");
            match connector.connect(&connection_string, SYSDBA, &self.service_sysdba_password) {
                Ok(session) => {
                    tracing::info!(user = SYSDBA, source = "cached", "service session established");
                    return Ok(session);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "cached SYSDBA password rejected");
                    self.service_sysdba_password.clear();
                }
            }
        }
        if progress.is_canceled() {
            return Err(EmberError::Cancelled);
        }

        if !sysdba && !self.service_user.is_empty() {
            progress.step(&format!("Using current {} password", self.service_user));
            match connector.connect(&connection_string, &self.service_user, &self.service_password) {
                Ok(session) => {
                    tracing::info!(user = %self.service_user, source = "cached", "service session established");
                    return Ok(session);
                }
                Err(e) => {
                    tracing::debug!(user = %self.service_user, error = %e, "cached service login rejected");
                    self.service_user.clear();
                    self.service_password.clear();
                }
            }
        }

        let connected = self.connected_candidates(sysdba);
        if let Some(session) = self.try_candidates(connector, &connection_string, &mut progress, connected, sysdba)? {
            return Ok(session);
        }
        let stored = self.stored_candidates(sysdba);
        if let Some(session) = self.try_candidates(connector, &connection_string, &mut progress, stored, sysdba)? {
            return Ok(session);
        }

        tracing::warn!(sysdba, "no known credentials opened a service session");
        Err(EmberError::Connection(format!(
            "{}: no usable credentials for the service manager",
            connection_string
        )))
    }

    /// Live logins of connected databases, in collection order. `None`
    /// entries stand for databases that are skipped.
    fn connected_candidates(&self, sysdba: bool) -> Vec<Option<Candidate>> {
        self.databases
            .iter()
            .map(|db| {
                if !db.is_connected() {
                    return None;
                }
                let username = db.connected_username().unwrap_or_default();
                if sysdba && !is_sysdba(username) {
                    return None;
                }
                Some(Candidate {
                    username: username.to_string(),
                    password: db.connected_password().unwrap_or_default().to_string(),
                    source: db.name().to_string(),
                })
            })
            .collect()
    }

    /// Stored logins of disconnected databases that have a password
    fn stored_candidates(&self, sysdba: bool) -> Vec<Option<Candidate>> {
        self.databases
            .iter()
            .map(|db| {
                if db.is_connected()
                    || db.password().is_empty()
                    || (sysdba && !is_sysdba(db.username()))
                {
                    return None;
                }
                Some(Candidate {
                    username: db.username().to_string(),
                    password: db.password().to_string(),
                    source: db.name().to_string(),
                })
            })
            .collect()
    }

    fn try_candidates(
        &mut self,
        connector: &dyn ServiceConnector,
        connection_string: &str,
        progress: &mut Progress<'_>,
        candidates: Vec<Option<Candidate>>,
        sysdba: bool,
    ) -> Result<Option<Box<dyn ServiceSession>>> {
        for candidate in candidates {
            if progress.is_canceled() {
                return Err(EmberError::Cancelled);
            }
            let Some(candidate) = candidate else {
                continue;
            };
            progress.step(&format!(
                "Using password of: {}@{}",
                candidate.username, candidate.source
            ));
            match connector.connect(connection_string, &candidate.username, &candidate.password) {
                Ok(session) => {
                    tracing::info!(
                        user = %candidate.username,
                        source = %candidate.source,
                        "service session established"
                    );
                    if sysdba {
                        self.service_sysdba_password = candidate.password;
                    } else {
                        self.service_user = candidate.username;
                        self.service_password = candidate.password;
                    }
                    return Ok(Some(session));
                }
                Err(e) => {
                    tracing::debug!(user = %candidate.username, source = %candidate.source, error = %e, "service login rejected");
                }
            }
        }
        Ok(None)
    }

    /// Read the server's user accounts through a SYSDBA service session,
    /// sorted by username.
    pub fn get_users(
        &mut self,
        connector: &dyn ServiceConnector,
        progress: Option<&mut dyn ProgressIndicator>,
    ) -> Result<&[User]> {
        self.users.clear();
        let mut session = self.get_service(connector, progress, true)?;
        let mut users = session.users()?;
        users.sort_by(|a, b| a.username.cmp(&b.username));
        tracing::debug!(count = users.len(), "loaded server users");
        self.users = users;
        Ok(&self.users)
    }

    /// Users read by the last successful [`Server::get_users`]
    pub fn users(&self) -> &[User] {
        &self.users
    }
}

impl MetadataNode for Server {
    fn item(&self) -> &MetadataItem {
        &self.item
    }

    fn accept_visitor(&self, visitor: &mut dyn MetadataItemVisitor) {
        visitor.visit_server(self);
    }

    fn get_children<'a>(&'a self, out: &mut Vec<&'a dyn MetadataNode>) -> bool {
        out.extend(self.databases.iter().map(|d| d as &dyn MetadataNode));
        !self.databases.is_empty()
    }

    fn invalidate(&mut self, facet: Option<FacetKind>) {
        for database in &mut self.databases {
            database.invalidate(facet);
        }
    }
}
