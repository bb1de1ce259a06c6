//! Data API layer (PostgREST).

pub mod postgrest;

pub use postgrest::{RestDb, SyncUserParams, UserDataBundle};

/// Table and procedure names as constants.
pub mod tables {
    pub const USERS: &str = "users";
    pub const USER_PROFILES: &str = "user_profiles";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    /// Aggregated profile + subscription + derived plan status
    pub const RPC_GET_USER_DATA: &str = "get_user_data";
    /// Profile upsert run after every successful authentication
    pub const RPC_SYNC_USER: &str = "sync_user_on_signup";
}
