//! Feature registry.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use caselens_protocols::{FeatureError, PageType};

use crate::feature::FeatureModule;

/// Registered feature modules, kept in registration order.
pub struct FeatureRegistry {
    features: DashMap<String, Arc<dyn FeatureModule>>,
    order: RwLock<Vec<String>>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self {
            features: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Register a feature.
    pub fn register(&self, feature: Arc<dyn FeatureModule>) -> Result<(), FeatureError> {
        let name = feature.name().to_string();

        if self.features.contains_key(&name) {
            return Err(FeatureError::AlreadyRegistered(name));
        }

        self.order.write().push(name.clone());
        self.features.insert(name, feature);
        Ok(())
    }

    /// Unregister a feature.
    pub fn unregister(&self, name: &str) -> Result<(), FeatureError> {
        self.features
            .remove(name)
            .ok_or_else(|| FeatureError::NotFound(name.to_string()))?;
        self.order.write().retain(|n| n != name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FeatureModule>> {
        self.features.get(name).map(|f| f.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    /// Feature names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Features supporting `page_type`, in registration order.
    pub fn supporting(&self, page_type: PageType) -> Vec<Arc<dyn FeatureModule>> {
        self.order
            .read()
            .iter()
            .filter_map(|name| self.get(name))
            .filter(|f| f.supports(page_type))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureContext;
    use async_trait::async_trait;

    struct MockFeature {
        name: String,
        pages: Vec<PageType>,
    }

    impl MockFeature {
        fn new(name: &str, pages: &[PageType]) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                pages: pages.to_vec(),
            })
        }
    }

    #[async_trait]
    impl FeatureModule for MockFeature {
        fn name(&self) -> &str {
            &self.name
        }

        fn supports(&self, page_type: PageType) -> bool {
            self.pages.contains(&page_type)
        }

        async fn activate(&self, _context: FeatureContext) -> Result<(), FeatureError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = FeatureRegistry::new();
        registry
            .register(MockFeature::new("highlight", &[PageType::CaseListPage]))
            .unwrap();
        assert!(registry.contains("highlight"));
        assert!(registry.get("highlight").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_duplicate() {
        let registry = FeatureRegistry::new();
        registry.register(MockFeature::new("menu", &[])).unwrap();
        let result = registry.register(MockFeature::new("menu", &[]));
        assert!(matches!(result, Err(FeatureError::AlreadyRegistered(_))));
    }

    #[test]
    fn test_unregister() {
        let registry = FeatureRegistry::new();
        registry.register(MockFeature::new("menu", &[])).unwrap();
        registry.unregister("menu").unwrap();
        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
        assert!(matches!(
            registry.unregister("menu"),
            Err(FeatureError::NotFound(_))
        ));
    }

    #[test]
    fn test_supporting_keeps_registration_order() {
        let registry = FeatureRegistry::new();
        registry
            .register(MockFeature::new("menu", &[PageType::CasePage]))
            .unwrap();
        registry
            .register(MockFeature::new("highlight", &[PageType::CasePage, PageType::CaseListPage]))
            .unwrap();
        registry
            .register(MockFeature::new("comments", &[PageType::CaseCommentsPage]))
            .unwrap();

        let names: Vec<_> = registry
            .supporting(PageType::CasePage)
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(names, vec!["menu", "highlight"]);
        assert!(registry.supporting(PageType::Unknown).is_empty());
    }
}
