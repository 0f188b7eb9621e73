use sea_orm_migration::prelude::*;

mod m20260301_000001_initial_schema;
mod m20260301_000002_seed_reference_data;

pub use m20260301_000002_seed_reference_data::{
    BOOTSTRAP_ADMIN_PASSWORD, BOOTSTRAP_ADMIN_USERNAME,
};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_initial_schema::Migration),
            Box::new(m20260301_000002_seed_reference_data::Migration),
        ]
    }
}
