//! Twitter REST v1.1 adapter
//!
//! Illustrates reuse of the core contract against a real provider: the
//! error-code tables that disambiguate coarse HTTP statuses, the request
//! defaults for each endpoint, and the per-endpoint derivation of pagination
//! meta. Timeline and search paginate by descending id; friend/follower id
//! listings paginate by cursor with `0` as the exhaustion sentinel.

use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

use crate::classify::{http_status_rules, Disposition, ErrorClassifier};
use crate::engine::{CallError, CallResult, RequestDescriptor, RestCallEngine};
use crate::limiter::RateLimitHeaders;
use crate::paginate::{CursorPages, IdPages, Page, PageMeta};
use crate::Params;

const USERS_SHOW_URL: &str = "https://api.twitter.com/1.1/users/show.json";
const USERS_LOOKUP_URL: &str = "https://api.twitter.com/1.1/users/lookup.json";
const USER_TIMELINE_URL: &str = "https://api.twitter.com/1.1/statuses/user_timeline.json";
const SEARCH_TWEETS_URL: &str = "https://api.twitter.com/1.1/search/tweets.json";
const FRIENDS_IDS_URL: &str = "https://api.twitter.com/1.1/friends/ids.json";
const FOLLOWERS_IDS_URL: &str = "https://api.twitter.com/1.1/followers/ids.json";

/// 403/404 carry expected data (protected or deleted accounts) on the user
/// and id endpoints; treat them as answers, not failures.
pub const ACCEPT_CODES: &[u16] = &[403, 404];

/// Classifier loaded with Twitter's numeric error codes.
///
/// The code table is what distinguishes a 403 meaning "account suspended"
/// (rotate credentials) from a 403 meaning "protected content" (give up).
pub fn classifier() -> ErrorClassifier {
    use Disposition::*;

    let code_rules = HashMap::from([
        (32, SkipAndRetry),  // could not authenticate you
        (34, Giveup),        // page does not exist
        (64, SkipAndRetry),  // account suspended
        (68, Giveup),        // REST v1 retired
        (88, Retry),         // rate limit exceeded
        (89, SkipAndRetry),  // invalid or expired token
        (92, Giveup),        // SSL required
        (130, Retry),        // over capacity
        (131, Retry),        // internal error
        (135, SkipAndRetry), // oauth timestamp out of range
        (136, Giveup),       // blocked by user
        (161, Giveup),       // follow limit reached
        (179, Giveup),       // not authorized to see status
        (185, Giveup),       // over daily status update limit
        (187, Giveup),       // duplicate status
        (215, SkipAndRetry), // bad authentication data
        (226, SkipAndRetry), // flagged as automated
        (231, Giveup),       // user must verify login
        (251, Giveup),       // endpoint retired
        (261, Giveup),       // application cannot write
        (271, Giveup),       // cannot mute yourself
        (272, Giveup),       // not muting this user
        (326, SkipAndRetry), // account temporarily locked
        (354, Giveup),       // direct message too long
    ]);

    ErrorClassifier::new(http_status_rules(), code_rules)
}

/// Twitter's quota header names (epoch-second reset).
pub fn rate_limit_headers() -> RateLimitHeaders {
    RateLimitHeaders {
        remaining: "x-rate-limit-remaining".to_string(),
        reset: "x-rate-limit-reset".to_string(),
    }
}

fn set_default(params: &mut Params, key: &str, value: &str) {
    if !params.iter().any(|(k, _)| k == key) {
        params.push((key.to_string(), value.to_string()));
    }
}

/// Return the profile of a single user.
pub async fn users_show(
    engine: &RestCallEngine,
    mut params: Params,
) -> Result<CallResult, CallError> {
    set_default(&mut params, "include_entities", "1");
    let desc = RequestDescriptor::get(USERS_SHOW_URL, params);
    engine.call_accepting(&desc, ACCEPT_CODES).await
}

/// Look up the profiles of up to 100 users in one POST.
///
/// `user_id` / `screen_name` lists must already be csv-joined
/// (see [`super::list_to_csv`]).
pub async fn users_lookup(
    engine: &RestCallEngine,
    mut params: Params,
) -> Result<CallResult, CallError> {
    set_default(&mut params, "include_entities", "1");
    let desc = RequestDescriptor::post(USERS_LOOKUP_URL, params);
    engine.call_accepting(&desc, ACCEPT_CODES).await
}

/// Fetch one page of a user's timeline, with descending-id meta.
pub async fn user_timeline(
    engine: &RestCallEngine,
    mut params: Params,
) -> Result<Page, CallError> {
    set_default(&mut params, "include_rts", "1");
    set_default(&mut params, "count", "200");
    let desc = RequestDescriptor::get(USER_TIMELINE_URL, params);
    let result = engine.call_accepting(&desc, ACCEPT_CODES).await?;
    let meta = id_meta(&result, |payload| payload.as_array());
    Ok(Page {
        payload: result.payload,
        meta,
    })
}

/// Fetch one page of tweet search results, with descending-id meta.
pub async fn search_tweets(
    engine: &RestCallEngine,
    mut params: Params,
) -> Result<Page, CallError> {
    set_default(&mut params, "include_entities", "true");
    set_default(&mut params, "count", "100");
    let desc = RequestDescriptor::get(SEARCH_TWEETS_URL, params);
    let result = engine.call(&desc).await?;
    let meta = id_meta(&result, |payload| {
        payload.get("statuses").and_then(|s| s.as_array())
    });
    Ok(Page {
        payload: result.payload,
        meta,
    })
}

/// Fetch one page of a user's friend ids, with cursor meta.
pub async fn friends_ids(engine: &RestCallEngine, params: Params) -> Result<Page, CallError> {
    ids_page(engine, FRIENDS_IDS_URL, params).await
}

/// Fetch one page of a user's follower ids, with cursor meta.
pub async fn followers_ids(engine: &RestCallEngine, params: Params) -> Result<Page, CallError> {
    ids_page(engine, FOLLOWERS_IDS_URL, params).await
}

async fn ids_page(
    engine: &RestCallEngine,
    url: &str,
    mut params: Params,
) -> Result<Page, CallError> {
    set_default(&mut params, "count", "5000");
    let desc = RequestDescriptor::get(url, params);
    let result = engine.call_accepting(&desc, ACCEPT_CODES).await?;
    let meta = cursor_meta(&result);
    Ok(Page {
        payload: result.payload,
        meta,
    })
}

/// Lazy descending-id sequence over a user's timeline.
pub fn user_timeline_pages(
    engine: Arc<RestCallEngine>,
    params: Params,
    budget: usize,
) -> IdPages<impl FnMut(Params) -> BoxFuture<'static, Result<Page, CallError>>> {
    IdPages::new(
        move |page_params| -> BoxFuture<'static, Result<Page, CallError>> {
            let engine = engine.clone();
            Box::pin(async move { user_timeline(&engine, page_params).await })
        },
        params,
        budget,
    )
}

/// Lazy descending-id sequence over tweet search results.
pub fn search_tweets_pages(
    engine: Arc<RestCallEngine>,
    params: Params,
    budget: usize,
) -> IdPages<impl FnMut(Params) -> BoxFuture<'static, Result<Page, CallError>>> {
    IdPages::new(
        move |page_params| -> BoxFuture<'static, Result<Page, CallError>> {
            let engine = engine.clone();
            Box::pin(async move { search_tweets(&engine, page_params).await })
        },
        params,
        budget,
    )
}

/// Lazy cursor sequence over a user's follower ids.
pub fn followers_ids_pages(
    engine: Arc<RestCallEngine>,
    params: Params,
    budget: usize,
) -> CursorPages<impl FnMut(Params) -> BoxFuture<'static, Result<Page, CallError>>> {
    CursorPages::new(
        move |page_params| -> BoxFuture<'static, Result<Page, CallError>> {
            let engine = engine.clone();
            Box::pin(async move { followers_ids(&engine, page_params).await })
        },
        params,
        budget,
    )
}

/// Lazy cursor sequence over a user's friend ids.
pub fn friends_ids_pages(
    engine: Arc<RestCallEngine>,
    params: Params,
    budget: usize,
) -> CursorPages<impl FnMut(Params) -> BoxFuture<'static, Result<Page, CallError>>> {
    CursorPages::new(
        move |page_params| -> BoxFuture<'static, Result<Page, CallError>> {
            let engine = engine.clone();
            Box::pin(async move { friends_ids(&engine, page_params).await })
        },
        params,
        budget,
    )
}

/// Derive descending-id meta from a payload of tweet objects.
///
/// `max_id` is the smallest id seen minus one, so requesting it returns
/// strictly older tweets. Give-up pages and empty pages produce a `None`
/// max_id, which terminates an [`IdPages`] sequence after the page is
/// yielded.
fn id_meta<'a>(
    result: &'a CallResult,
    tweets: impl Fn(&'a serde_json::Value) -> Option<&'a Vec<serde_json::Value>>,
) -> PageMeta {
    let ids: Option<Vec<i64>> = tweets(&result.payload).map(|list| {
        list.iter()
            .filter_map(|tweet| tweet.get("id").and_then(|id| id.as_i64()))
            .collect()
    });

    match ids {
        Some(ids) if !ids.is_empty() => {
            let smallest = ids.iter().min().copied().unwrap_or(i64::MAX);
            PageMeta::for_ids(result.status_code, ids.len(), Some(smallest - 1))
        }
        _ => PageMeta::for_ids(result.status_code, 0, None),
    }
}

/// Derive cursor meta from an id-listing payload.
fn cursor_meta(result: &CallResult) -> PageMeta {
    let next_cursor = result
        .payload
        .get("next_cursor")
        .and_then(|c| c.as_i64());
    let count = result
        .payload
        .get("ids")
        .and_then(|ids| ids.as_array())
        .map_or(0, Vec::len);
    PageMeta::for_cursor(result.status_code, count, next_cursor.or(Some(0)))
}
