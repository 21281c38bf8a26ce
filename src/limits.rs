//! Hard caps on record sizes and counts. Scheduling rules that are part of
//! the business policy live in [`crate::config::SchedulingPolicy`] instead.

pub const MAX_OWNERS: usize = 100_000;
pub const MAX_WALKERS: usize = 100_000;
pub const MAX_PETS: usize = 500_000;
pub const MAX_APPOINTMENTS: usize = 5_000_000;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_SPECIES_LEN: usize = 50;
pub const MAX_BREED_LEN: usize = 50;
pub const MAX_EMAIL_LEN: usize = 50;
pub const MAX_PHONE_LEN: usize = 20;
pub const MAX_COMPANY_PHONE_LEN: usize = 50;
pub const MAX_ID_NUMBER_LEN: usize = 20;
pub const MAX_WALKER_ADDRESS_LEN: usize = 100;
pub const MAX_OWNER_ADDRESS_LEN: usize = 50;
pub const MAX_RECOMMENDATIONS_LEN: usize = 500;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 10;

pub const MAX_SQL_LEN: usize = 64 * 1024;
