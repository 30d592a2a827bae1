//! Article comments with a read-your-writes cache.
//!
//! Top-level comments of an article are cached under `comments:<article>` and
//! replies under `replies:<comment>`. Every mutation rewrites or removes the
//! entries it affects, so a read after a write never shows the old list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::{self, resource_path, ApiError, ApiRequest, Method, Transport};
use crate::cache::{keys, CachePolicy, CacheShim};
use crate::session::Session;
use crate::validation;

const MAX_CONTENT_CHARS: usize = 1000;
const REPLIES_PREFIX: &str = "replies:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub article_id: String,
    pub content: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

pub struct CommentService {
    transport: Arc<dyn Transport>,
    cache: CacheShim,
    session: Session,
}

impl CommentService {
    pub fn new(transport: Arc<dyn Transport>, cache: CacheShim, session: Session) -> Self {
        Self {
            transport,
            cache,
            session,
        }
    }

    pub async fn list(&self, article_id: &str) -> Result<Vec<Comment>, ApiError> {
        let path = resource_path(&["comments", "article", article_id]);
        self.cache
            .get_or_fetch(&keys::comments(article_id), CachePolicy::NoExpiry, || {
                self.fetch_list(path)
            })
            .await
    }

    pub async fn replies(&self, comment_id: &str) -> Result<Vec<Comment>, ApiError> {
        let path = resource_path(&["comments", comment_id, "replies"]);
        self.cache
            .get_or_fetch(&keys::replies(comment_id), CachePolicy::NoExpiry, || {
                self.fetch_list(path)
            })
            .await
    }

    /// Drops the cached list and reads it again from the backend.
    pub async fn refresh(&self, article_id: &str) -> Result<Vec<Comment>, ApiError> {
        if let Err(err) = self.cache.invalidate(&keys::comments(article_id)) {
            tracing::warn!(%article_id, error = %err, "failed to drop comment cache");
        }
        self.list(article_id).await
    }

    pub async fn add(
        &self,
        article_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment, ApiError> {
        validation::required("content", content)?;
        validation::max_chars("content", content, MAX_CONTENT_CHARS)?;
        let token = self.session.require_token()?;

        let request = ApiRequest::new(Method::Post, "comments")
            .json(json!({
                "articleId": article_id,
                "content": content.trim(),
                "parentId": parent_id,
            }))
            .bearer(Some(token));
        let data = api::mutate(self.transport.as_ref(), request).await?;
        let comment: Comment = match data {
            Some(raw) => serde_json::from_value(raw)?,
            None => return Err(ApiError::Decode("created comment missing from response".into())),
        };

        let key = match parent_id {
            Some(parent) => keys::replies(parent),
            None => keys::comments(article_id),
        };
        self.rewrite(&key, |list| list.insert(0, comment.clone()));
        Ok(comment)
    }

    pub async fn edit(&self, article_id: &str, comment_id: &str, content: &str) -> Result<(), ApiError> {
        validation::required("content", content)?;
        validation::max_chars("content", content, MAX_CONTENT_CHARS)?;
        let token = self.session.require_token()?;

        let request = ApiRequest::new(Method::Put, resource_path(&["comments", comment_id]))
            .json(json!({ "content": content.trim() }))
            .bearer(Some(token));
        api::mutate(self.transport.as_ref(), request).await?;

        let update = |list: &mut Vec<Comment>| {
            if let Some(comment) = list.iter_mut().find(|comment| comment.id == comment_id) {
                comment.content = content.trim().to_string();
            }
        };
        self.rewrite(&keys::comments(article_id), update);
        for key in self.cached_reply_keys() {
            self.rewrite(&key, update);
        }
        Ok(())
    }

    /// Deletes one comment, removing it from every cached list and dropping its
    /// own reply cache.
    pub async fn delete(&self, article_id: &str, comment_id: &str) -> Result<(), ApiError> {
        let token = self.session.require_token()?;
        let request = ApiRequest::new(Method::Delete, resource_path(&["comments", comment_id]))
            .bearer(Some(token));
        api::mutate(self.transport.as_ref(), request).await?;

        let remove = |list: &mut Vec<Comment>| list.retain(|comment| comment.id != comment_id);
        self.rewrite(&keys::comments(article_id), remove);
        for key in self.cached_reply_keys() {
            self.rewrite(&key, remove);
        }
        self.drop_key(&keys::replies(comment_id));
        Ok(())
    }

    /// Deletes every comment on an article. `confirm` must repeat the article id.
    pub async fn delete_all(&self, article_id: &str, confirm: &str) -> Result<(), ApiError> {
        validation::confirmation("article id", article_id, confirm)?;
        let token = self.session.require_token()?;
        let cached: Option<Vec<Comment>> =
            self.cache.read(&keys::comments(article_id), CachePolicy::NoExpiry);

        let path = resource_path(&["comments", "article", article_id]);
        let request = ApiRequest::new(Method::Delete, path).bearer(Some(token));
        api::mutate(self.transport.as_ref(), request).await?;

        for comment in cached.unwrap_or_default() {
            self.drop_key(&keys::replies(&comment.id));
        }
        self.drop_key(&keys::comments(article_id));
        Ok(())
    }

    async fn fetch_list(&self, path: String) -> Result<Vec<Comment>, ApiError> {
        let rows = api::fetch_collection(self.transport.as_ref(), ApiRequest::get(path)).await?;
        Ok(serde_json::from_value(Value::Array(rows))?)
    }

    /// Applies `edit` to a cached list if one exists. Absent lists stay absent
    /// so the next read fetches the full list.
    fn rewrite<F>(&self, key: &str, edit: F)
    where
        F: FnOnce(&mut Vec<Comment>),
    {
        let Some(mut list) = self.cache.read::<Vec<Comment>>(key, CachePolicy::NoExpiry) else {
            return;
        };
        edit(&mut list);
        if let Err(err) = self.cache.write(key, &list) {
            tracing::warn!(%key, error = %err, "failed to rewrite comment cache, dropping it");
            self.drop_key(key);
        }
    }

    fn drop_key(&self, key: &str) {
        if let Err(err) = self.cache.invalidate(key) {
            tracing::warn!(%key, error = %err, "failed to invalidate comment cache");
        }
    }

    fn cached_reply_keys(&self) -> Vec<String> {
        self.cache
            .store()
            .keys(REPLIES_PREFIX)
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "failed to list reply caches");
                Vec::new()
            })
    }
}
