use anyhow::Result;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::{categories, difficulties, languages, prelude::*};

/// Read-only access to the reference tables seeded by migrations.
pub struct CatalogRepository<'a, C> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> CatalogRepository<'a, C> {
    #[must_use]
    pub const fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn list_languages(&self) -> Result<Vec<languages::Model>> {
        Ok(Languages::find()
            .order_by_asc(languages::Column::Id)
            .all(self.db)
            .await?)
    }

    pub async fn language_by_code(&self, code: &str) -> Result<Option<languages::Model>> {
        Ok(Languages::find()
            .filter(languages::Column::Code.eq(code.to_lowercase()))
            .one(self.db)
            .await?)
    }

    pub async fn list_categories(&self) -> Result<Vec<categories::Model>> {
        Ok(Categories::find()
            .order_by_asc(categories::Column::Name)
            .all(self.db)
            .await?)
    }

    pub async fn get_category(&self, id: i32) -> Result<Option<categories::Model>> {
        Ok(Categories::find_by_id(id).one(self.db).await?)
    }

    pub async fn list_difficulties(&self) -> Result<Vec<difficulties::Model>> {
        Ok(Difficulties::find()
            .order_by_asc(difficulties::Column::Level)
            .all(self.db)
            .await?)
    }

    pub async fn get_difficulty(&self, id: i32) -> Result<Option<difficulties::Model>> {
        Ok(Difficulties::find_by_id(id).one(self.db).await?)
    }
}
