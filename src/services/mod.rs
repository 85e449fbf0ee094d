pub mod mutation_engine;
pub mod remote_authority_service;
pub mod roster_store;
