#![forbid(unsafe_code)]

//! Script-facing host services: the user-data store and the registry that decides which APIs a
//! scripting session gets.

pub mod registry;
pub mod user_data;

pub use registry::{Api, ApiContainer, ApiKind, ApiRegistration, ServiceProvider, REGISTRATIONS};
pub use user_data::{
    shared, InMemoryUserData, SharedUserData, UserDataApi, UserDataError, UserDataStore,
    UserDataValue,
};
