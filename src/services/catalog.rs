use anyhow::Result;

use crate::db::Store;
use crate::entities::{categories, difficulties, languages};

/// Reference data and language resolution shared by the content services.
pub struct CatalogService {
    store: Store,
    default_language: String,
}

impl CatalogService {
    #[must_use]
    pub const fn new(store: Store, default_language: String) -> Self {
        Self {
            store,
            default_language,
        }
    }

    pub async fn languages(&self) -> Result<Vec<languages::Model>> {
        self.store.catalog().list_languages().await
    }

    pub async fn categories(&self) -> Result<Vec<categories::Model>> {
        self.store.catalog().list_categories().await
    }

    pub async fn difficulties(&self) -> Result<Vec<difficulties::Model>> {
        self.store.catalog().list_difficulties().await
    }

    /// The requested language, or the configured default when none is given.
    /// `None` means an explicit code did not match any language.
    pub async fn resolve_language(&self, code: Option<&str>) -> Result<Option<languages::Model>> {
        match code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => self.store.catalog().language_by_code(code).await,
            None => self.default_language().await,
        }
    }

    pub async fn default_language(&self) -> Result<Option<languages::Model>> {
        let catalog = self.store.catalog();
        if let Some(language) = catalog.language_by_code(&self.default_language).await? {
            return Ok(Some(language));
        }
        Ok(catalog.list_languages().await?.into_iter().next())
    }

    /// Fallback order for translated content: requested, default, anything.
    pub async fn fallback_chain(&self, requested: &languages::Model) -> Result<LanguageChain> {
        let default_id = self.default_language().await?.map(|l| l.id);
        Ok(LanguageChain {
            requested: requested.id,
            default: default_id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageChain {
    pub requested: i32,
    pub default: Option<i32>,
}

impl LanguageChain {
    /// Picks the best translation out of `rows` belonging to one entity.
    pub fn pick<'a, T>(
        &self,
        rows: impl IntoIterator<Item = &'a T>,
        language_of: impl Fn(&T) -> i32,
    ) -> Option<&'a T>
    where
        T: 'a,
    {
        let mut default = None;
        let mut first = None;

        for row in rows {
            let language = language_of(row);
            if language == self.requested {
                return Some(row);
            }
            if Some(language) == self.default && default.is_none() {
                default = Some(row);
            }
            if first.is_none() {
                first = Some(row);
            }
        }

        default.or(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_prefers_requested_then_default_then_first() {
        let rows = [(3, "fr"), (1, "en"), (2, "pl")];
        let lang = |row: &(i32, &str)| row.0;

        let chain = LanguageChain {
            requested: 2,
            default: Some(1),
        };
        assert_eq!(chain.pick(&rows, lang).map(|r| r.1), Some("pl"));

        let chain = LanguageChain {
            requested: 4,
            default: Some(1),
        };
        assert_eq!(chain.pick(&rows, lang).map(|r| r.1), Some("en"));

        let chain = LanguageChain {
            requested: 4,
            default: None,
        };
        assert_eq!(chain.pick(&rows, lang).map(|r| r.1), Some("fr"));

        let empty: [(i32, &str); 0] = [];
        assert!(chain.pick(&empty, lang).is_none());
    }
}
