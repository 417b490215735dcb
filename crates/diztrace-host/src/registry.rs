//! Explicit, compiled-in list of the APIs the host exposes to scripts.
//!
//! Each [`ApiRegistration`] decides from the [`ServiceProvider`] whether its API can be offered
//! and how to build it. [`ApiContainer`] holds whatever was built for the current provider.

use std::fmt;

use diztrace_client::{TcpTransport, TraceIpcTool, TransportConfig};
use tracing::debug;

use crate::user_data::{SharedUserData, UserDataApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiKind {
    UserData,
    TraceIpc,
}

impl ApiKind {
    pub fn name(self) -> &'static str {
        match self {
            ApiKind::UserData => "userdata",
            ApiKind::TraceIpc => "traceipc",
        }
    }
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Services the host currently has on offer. Missing services make the dependent APIs
/// unavailable rather than failing registration.
#[derive(Clone, Default)]
pub struct ServiceProvider {
    pub user_data: Option<SharedUserData>,
    pub transport: Option<TransportConfig>,
}

impl ServiceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_data(mut self, store: SharedUserData) -> Self {
        self.user_data = Some(store);
        self
    }

    pub fn with_transport(mut self, config: TransportConfig) -> Self {
        self.transport = Some(config);
        self
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("user_data", &self.user_data.is_some())
            .field("transport", &self.transport)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Api {
    UserData(UserDataApi),
    TraceIpc(TraceIpcTool<TcpTransport>),
}

impl Api {
    pub fn kind(&self) -> ApiKind {
        match self {
            Api::UserData(_) => ApiKind::UserData,
            Api::TraceIpc(_) => ApiKind::TraceIpc,
        }
    }
}

pub struct ApiRegistration {
    pub kind: ApiKind,
    pub is_available: fn(&ServiceProvider) -> bool,
    /// Only called when `is_available` returned true.
    pub build: fn(&ServiceProvider) -> Option<Api>,
}

pub const REGISTRATIONS: &[ApiRegistration] = &[
    ApiRegistration {
        kind: ApiKind::UserData,
        is_available: |services| services.user_data.is_some(),
        build: |services| {
            let store = services.user_data.clone()?;
            Some(Api::UserData(UserDataApi::new(store)))
        },
    },
    ApiRegistration {
        kind: ApiKind::TraceIpc,
        is_available: |services| services.transport.is_some(),
        build: |services| {
            let config = services.transport.clone()?;
            Some(Api::TraceIpc(TraceIpcTool::new(TcpTransport::new(config))))
        },
    },
];

#[derive(Debug, Default)]
pub struct ApiContainer {
    apis: Vec<Api>,
}

impl ApiContainer {
    pub fn register(services: &ServiceProvider) -> Self {
        let mut container = Self::default();
        container.populate(services);
        container
    }

    /// Drops every API and rebuilds from `services`.
    pub fn restart(&mut self, services: &ServiceProvider) {
        self.apis.clear();
        self.populate(services);
    }

    fn populate(&mut self, services: &ServiceProvider) {
        for registration in REGISTRATIONS {
            if !(registration.is_available)(services) {
                debug!(api = %registration.kind, "api unavailable");
                continue;
            }
            if let Some(api) = (registration.build)(services) {
                debug!(api = %registration.kind, "api registered");
                self.apis.push(api);
            }
        }
    }

    pub fn kinds(&self) -> Vec<ApiKind> {
        self.apis.iter().map(Api::kind).collect()
    }

    pub fn get(&self, kind: ApiKind) -> Option<&Api> {
        self.apis.iter().find(|api| api.kind() == kind)
    }

    pub fn user_data(&self) -> Option<&UserDataApi> {
        match self.get(ApiKind::UserData)? {
            Api::UserData(api) => Some(api),
            _ => None,
        }
    }

    pub fn trace_ipc(&self) -> Option<&TraceIpcTool<TcpTransport>> {
        match self.get(ApiKind::TraceIpc)? {
            Api::TraceIpc(tool) => Some(tool),
            _ => None,
        }
    }
}
