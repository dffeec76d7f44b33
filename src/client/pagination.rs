use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use url::Url;

use super::CircleCiClient;
use crate::error::Result;

/// Name of the continuation-token query parameter.
const PAGE_TOKEN_PARAM: &str = "page-token";

/// One decoded page of a paginated v2 resource.
///
/// A body without an `items` field fails to decode, which terminates the
/// whole sequence.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Build the request for the next page: a copy of the template with only
/// the continuation-token parameter replaced.
pub fn next_page_url(template: &Url, token: &str) -> Url {
    let mut url = template.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != PAGE_TOKEN_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(PAGE_TOKEN_PARAM, token);

    url
}

/// Lazy cursor-based paginator over one v2 resource.
///
/// Items are yielded one at a time in response order. The item budget is
/// decremented after each yield; when it hits zero the sequence ends
/// immediately, even mid-page, without issuing further requests. A missing
/// or empty continuation token ends the sequence naturally.
pub struct Paginator<T> {
    client: Arc<CircleCiClient>,
    template: Url,
    next: Option<Url>,
    buffer: VecDeque<T>,
    remaining: Option<usize>,
}

impl<T: DeserializeOwned> Paginator<T> {
    /// `limit` of `None` means unbounded.
    pub fn new(client: Arc<CircleCiClient>, template: Url, limit: Option<usize>) -> Self {
        Self {
            client,
            next: Some(template.clone()),
            template,
            buffer: VecDeque::new(),
            remaining: limit,
        }
    }

    pub async fn next_item(&mut self) -> Result<Option<T>> {
        loop {
            if self.remaining == Some(0) {
                return Ok(None);
            }

            if let Some(item) = self.buffer.pop_front() {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Ok(Some(item));
            }

            let Some(url) = self.next.take() else {
                return Ok(None);
            };

            let page: Page<T> = self.client.get_json(url).await?;
            self.buffer = page.items.into();
            self.next = page
                .next_page_token
                .filter(|token| !token.is_empty())
                .map(|token| next_page_url(&self.template, &token));
        }
    }
}
