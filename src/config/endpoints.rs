use indexmap::IndexMap;

use crate::api::EndpointSpec;

/// Named list resources of the portal backend, one per management screen.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    specs: IndexMap<String, EndpointSpec>,
}

impl ResourceRegistry {
    pub fn get(&self, name: &str) -> Option<&EndpointSpec> {
        self.specs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn all(&self) -> impl Iterator<Item = (&str, &EndpointSpec)> {
        self.specs.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// An override replaces the whole built-in entry of the same name.
    pub fn with_overrides(mut self, overrides: &IndexMap<String, EndpointSpec>) -> Self {
        for (name, spec) in overrides {
            if self.specs.insert(name.clone(), spec.clone()).is_none() {
                tracing::debug!(resource = %name, "registered custom resource");
            }
        }
        self
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        let specs = [
            (
                "articles",
                EndpointSpec::new("articles/filter")
                    .rename("search", "title")
                    .rename("category", "categoryId")
                    .rename("topic", "topicId")
                    .rename("from", "startDate")
                    .rename("to", "endDate"),
            ),
            (
                "my-posts",
                EndpointSpec::new("articles/author/filter")
                    .rename("search", "title")
                    .rename("category", "categoryId")
                    .rename("from", "startDate")
                    .rename("to", "endDate")
                    .authenticated(),
            ),
            (
                "post-history",
                EndpointSpec::new("articles/history")
                    .paging("page", "size")
                    .rename("from", "fromDate")
                    .rename("to", "toDate")
                    .authenticated(),
            ),
            (
                "saved",
                EndpointSpec::new("articles/saved").flat().authenticated(),
            ),
            (
                "accounts",
                EndpointSpec::new("users/filter")
                    .rename("search", "keyword")
                    .authenticated(),
            ),
            ("categories", EndpointSpec::new("categories").flat()),
            ("topics", EndpointSpec::new("topics").flat()),
            (
                "banners",
                EndpointSpec::new("banners").flat().authenticated(),
            ),
            (
                "comments-admin",
                EndpointSpec::new("comments/filter")
                    .rename("article", "articleId")
                    .rename("search", "content")
                    .authenticated(),
            ),
            (
                "article-stats",
                EndpointSpec::new("statistics/articles")
                    .paging("pageIndex", "pageSize")
                    .rename("from", "startDate")
                    .rename("to", "endDate")
                    .rename("sort", "orderBy")
                    .authenticated(),
            ),
            (
                "overview-stats",
                EndpointSpec::new("statistics/overview")
                    .rename("tab", "type")
                    .rename("from", "startDate")
                    .rename("to", "endDate")
                    .authenticated(),
            ),
        ]
        .into_iter()
        .map(|(name, spec)| (name.to_string(), spec))
        .collect();
        Self { specs }
    }
}
