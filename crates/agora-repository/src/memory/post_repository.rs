use crate::traits::PostRepository;
use agora_core::{AgoraResult, Page, PageRequest, Post, PostId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Posts kept in a map.
#[derive(Default)]
pub struct InMemoryPostRepository {
    posts: RwLock<HashMap<PostId, Post>>,
}

impl InMemoryPostRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding `posts`.
    pub fn with_posts(posts: Vec<Post>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.posts.write();
            for post in posts {
                map.insert(post.id.clone(), post);
            }
        }
        repo
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn find_by_id(&self, id: &PostId) -> AgoraResult<Option<Post>> {
        Ok(self.posts.read().get(id).cloned())
    }

    async fn find_page(&self, page: PageRequest) -> AgoraResult<Page<Post>> {
        let mut posts: Vec<Post> = self.posts.read().values().cloned().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let total = posts.len() as u64;
        let items = posts
            .into_iter()
            .skip(page.offset())
            .take(page.limit())
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn save(&self, post: &Post) -> AgoraResult<Post> {
        self.posts.write().insert(post.id.clone(), post.clone());
        Ok(post.clone())
    }

    async fn delete(&self, id: &PostId) -> AgoraResult<bool> {
        Ok(self.posts.write().remove(id).is_some())
    }
}
