//! Storefront domain: aggregates, value objects, pricing services and the
//! repository contracts the infrastructure layer implements.

pub mod aggregates;
pub mod events;
pub mod repositories;
pub mod services;
pub mod value_objects;
