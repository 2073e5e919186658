pub mod agent;
pub mod config;
pub mod contact;
pub mod countdown;
pub mod episode;
pub mod field;
pub mod kinematics;
pub mod policy;
pub mod resource;
pub mod rng;
pub mod spatial;
pub mod world;
