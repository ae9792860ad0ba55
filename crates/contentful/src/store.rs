use async_trait::async_trait;
use cmsload_storage::{
    Asset, AssetPage, ContentStore, ContentTypeDef, Entry, EntryPage, EntryQuery, Fields,
    StoreError,
};
use serde::de::DeserializeOwned;
use tracing::debug;
use ureq::http::Response;
use ureq::Body;

use crate::wire::{
    entry_payload, error_message, query_pairs, status_error, Target, WireAsset, WireCollection,
    WireContentType, WireEntry,
};

/// Media type of every Management API request body.
pub const MANAGEMENT_MEDIA_TYPE: &str = "application/vnd.contentful.management.v1+json";

/// Largest page the content type listing accepts.
const CONTENT_TYPE_PAGE: usize = 1000;

/// One environment of a Contentful space, reached through the Management API.
///
/// Requests are blocking `ureq` calls moved onto tokio's blocking pool. The
/// agent does not treat HTTP error statuses as transport errors, so every
/// status can be mapped onto [`StoreError`] with the API's own message.
#[derive(Clone)]
pub struct ContentfulStore {
    agent: ureq::Agent,
    environment_url: String,
    token: String,
}

impl std::fmt::Debug for ContentfulStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentfulStore")
            .field("environment_url", &self.environment_url)
            .finish_non_exhaustive()
    }
}

/// `{api}/spaces/{space}/environments/{environment}`
pub fn environment_url(api_url: &str, space_id: &str, environment: &str) -> String {
    format!(
        "{}/spaces/{}/environments/{}",
        api_url.trim_end_matches('/'),
        space_id,
        environment
    )
}

impl ContentfulStore {
    pub fn new(api_url: &str, space_id: &str, environment: &str, token: &str) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.into(),
            environment_url: environment_url(api_url, space_id, environment),
            token: token.to_string(),
        }
    }

    fn entries_url(&self) -> String {
        format!("{}/entries", self.environment_url)
    }

    fn entry_url(&self, id: &str) -> String {
        format!("{}/entries/{}", self.environment_url, id)
    }

    fn assets_url(&self) -> String {
        format!("{}/assets", self.environment_url)
    }

    fn asset_url(&self, id: &str) -> String {
        format!("{}/assets/{}", self.environment_url, id)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Run one blocking request on the blocking pool.
    async fn execute<T, F>(&self, request: F) -> Result<T, StoreError>
    where
        F: FnOnce(&ureq::Agent) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || request(&agent))
            .await
            .map_err(|e| StoreError::Backend(format!("task join error: {}", e)))?
    }
}

fn transport(e: ureq::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Decode a success body as `T`, or map the status onto a store error.
fn read_body<T: DeserializeOwned>(
    response: Response<Body>,
    target: Target<'_>,
) -> Result<T, StoreError> {
    let status = response.status().as_u16();
    let mut body = response.into_body();
    if !(200..300).contains(&status) {
        let text = body.read_to_string().unwrap_or_default();
        return Err(status_error(status, error_message(&text), target));
    }
    body.read_json::<T>()
        .map_err(|e| StoreError::Backend(format!("failed to parse response as JSON: {}", e)))
}

fn check_status(response: Response<Body>, target: Target<'_>) -> Result<(), StoreError> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(());
    }
    let text = response.into_body().read_to_string().unwrap_or_default();
    Err(status_error(status, error_message(&text), target))
}

#[async_trait]
impl ContentStore for ContentfulStore {
    async fn list_entries(&self, query: &EntryQuery) -> Result<EntryPage, StoreError> {
        let url = self.entries_url();
        let auth = self.bearer();
        let pairs = query_pairs(query);
        debug!("GET {} {:?}", url, pairs);
        self.execute(move |agent| {
            let mut request = agent.get(&url).header("Authorization", &auth);
            for (key, value) in &pairs {
                request = request.query(key, value);
            }
            let response = request.call().map_err(transport)?;
            read_body::<WireCollection<WireEntry>>(response, Target::Collection)
                .map(WireCollection::into_page)
        })
        .await
    }

    async fn create_entry(&self, content_type: &str, fields: Fields) -> Result<Entry, StoreError> {
        let url = self.entries_url();
        let auth = self.bearer();
        let content_type = content_type.to_string();
        let body = entry_payload(&fields, &[]).to_string();
        debug!("POST {} ({})", url, content_type);
        self.execute(move |agent| {
            let response = agent
                .post(&url)
                .header("Authorization", &auth)
                .header("Content-Type", MANAGEMENT_MEDIA_TYPE)
                .header("X-Contentful-Content-Type", &content_type)
                .send(body)
                .map_err(transport)?;
            read_body::<WireEntry>(response, Target::Collection).map(Entry::from)
        })
        .await
    }

    async fn create_entry_with_id(
        &self,
        content_type: &str,
        id: &str,
        fields: Fields,
    ) -> Result<Entry, StoreError> {
        let url = self.entry_url(id);
        let auth = self.bearer();
        let content_type = content_type.to_string();
        let id = id.to_string();
        let body = entry_payload(&fields, &[]).to_string();
        debug!("PUT {} ({})", url, content_type);
        self.execute(move |agent| {
            let response = agent
                .put(&url)
                .header("Authorization", &auth)
                .header("Content-Type", MANAGEMENT_MEDIA_TYPE)
                .header("X-Contentful-Content-Type", &content_type)
                .send(body)
                .map_err(transport)?;
            read_body::<WireEntry>(response, Target::NewEntry(&id)).map(Entry::from)
        })
        .await
    }

    async fn get_entry(&self, id: &str) -> Result<Entry, StoreError> {
        let url = self.entry_url(id);
        let auth = self.bearer();
        let id = id.to_string();
        self.execute(move |agent| {
            let response = agent
                .get(&url)
                .header("Authorization", &auth)
                .call()
                .map_err(transport)?;
            read_body::<WireEntry>(response, Target::Entry(&id, None)).map(Entry::from)
        })
        .await
    }

    async fn update_entry(&self, entry: &Entry) -> Result<Entry, StoreError> {
        let url = self.entry_url(entry.id());
        let auth = self.bearer();
        let id = entry.id().to_string();
        let version = entry.sys.version;
        let body = entry_payload(&entry.fields, &entry.tags).to_string();
        debug!("PUT {} (version {})", url, version);
        self.execute(move |agent| {
            let response = agent
                .put(&url)
                .header("Authorization", &auth)
                .header("Content-Type", MANAGEMENT_MEDIA_TYPE)
                .header("X-Contentful-Version", &version.to_string())
                .send(body)
                .map_err(transport)?;
            read_body::<WireEntry>(response, Target::Entry(&id, Some(version))).map(Entry::from)
        })
        .await
    }

    async fn delete_entry(&self, id: &str) -> Result<(), StoreError> {
        let url = self.entry_url(id);
        let auth = self.bearer();
        let id = id.to_string();
        debug!("DELETE {}", url);
        self.execute(move |agent| {
            let response = agent
                .delete(&url)
                .header("Authorization", &auth)
                .call()
                .map_err(transport)?;
            check_status(response, Target::Entry(&id, None))
        })
        .await
    }

    async fn publish_entry(&self, entry: &Entry) -> Result<Entry, StoreError> {
        let url = format!("{}/published", self.entry_url(entry.id()));
        let auth = self.bearer();
        let id = entry.id().to_string();
        let version = entry.sys.version;
        debug!("PUT {} (version {})", url, version);
        self.execute(move |agent| {
            let response = agent
                .put(&url)
                .header("Authorization", &auth)
                .header("X-Contentful-Version", &version.to_string())
                .send_empty()
                .map_err(transport)?;
            read_body::<WireEntry>(response, Target::Entry(&id, Some(version))).map(Entry::from)
        })
        .await
    }

    async fn list_assets(&self, query: &EntryQuery) -> Result<AssetPage, StoreError> {
        let url = self.assets_url();
        let auth = self.bearer();
        let mut pairs = query_pairs(query);
        pairs.retain(|(key, _)| key != "content_type");
        debug!("GET {} {:?}", url, pairs);
        self.execute(move |agent| {
            let mut request = agent.get(&url).header("Authorization", &auth);
            for (key, value) in &pairs {
                request = request.query(key, value);
            }
            let response = request.call().map_err(transport)?;
            read_body::<WireCollection<WireAsset>>(response, Target::Collection)
                .map(WireCollection::into_page)
        })
        .await
    }

    async fn create_asset(&self, fields: Fields) -> Result<Asset, StoreError> {
        let url = self.assets_url();
        let auth = self.bearer();
        let body = entry_payload(&fields, &[]).to_string();
        debug!("POST {}", url);
        self.execute(move |agent| {
            let response = agent
                .post(&url)
                .header("Authorization", &auth)
                .header("Content-Type", MANAGEMENT_MEDIA_TYPE)
                .send(body)
                .map_err(transport)?;
            read_body::<WireAsset>(response, Target::Collection).map(Asset::from)
        })
        .await
    }

    async fn create_asset_with_id(&self, id: &str, fields: Fields) -> Result<Asset, StoreError> {
        let url = self.asset_url(id);
        let auth = self.bearer();
        let id = id.to_string();
        let body = entry_payload(&fields, &[]).to_string();
        debug!("PUT {}", url);
        self.execute(move |agent| {
            let response = agent
                .put(&url)
                .header("Authorization", &auth)
                .header("Content-Type", MANAGEMENT_MEDIA_TYPE)
                .send(body)
                .map_err(transport)?;
            read_body::<WireAsset>(response, Target::NewEntry(&id)).map(Asset::from)
        })
        .await
    }

    async fn get_asset(&self, id: &str) -> Result<Asset, StoreError> {
        let url = self.asset_url(id);
        let auth = self.bearer();
        let id = id.to_string();
        self.execute(move |agent| {
            let response = agent
                .get(&url)
                .header("Authorization", &auth)
                .call()
                .map_err(transport)?;
            read_body::<WireAsset>(response, Target::Entry(&id, None)).map(Asset::from)
        })
        .await
    }

    async fn update_asset(&self, asset: &Asset) -> Result<Asset, StoreError> {
        let url = self.asset_url(asset.id());
        let auth = self.bearer();
        let id = asset.id().to_string();
        let version = asset.sys.version;
        let body = entry_payload(&asset.fields, &asset.tags).to_string();
        debug!("PUT {} (version {})", url, version);
        self.execute(move |agent| {
            let response = agent
                .put(&url)
                .header("Authorization", &auth)
                .header("Content-Type", MANAGEMENT_MEDIA_TYPE)
                .header("X-Contentful-Version", &version.to_string())
                .send(body)
                .map_err(transport)?;
            read_body::<WireAsset>(response, Target::Entry(&id, Some(version))).map(Asset::from)
        })
        .await
    }

    async fn process_asset(&self, asset: &Asset, locale: &str) -> Result<(), StoreError> {
        let url = format!("{}/files/{}/process", self.asset_url(asset.id()), locale);
        let auth = self.bearer();
        let id = asset.id().to_string();
        let version = asset.sys.version;
        debug!("PUT {} (version {})", url, version);
        self.execute(move |agent| {
            let response = agent
                .put(&url)
                .header("Authorization", &auth)
                .header("X-Contentful-Version", &version.to_string())
                .send_empty()
                .map_err(transport)?;
            check_status(response, Target::Entry(&id, Some(version)))
        })
        .await
    }

    async fn publish_asset(&self, asset: &Asset) -> Result<Asset, StoreError> {
        let url = format!("{}/published", self.asset_url(asset.id()));
        let auth = self.bearer();
        let id = asset.id().to_string();
        let version = asset.sys.version;
        debug!("PUT {} (version {})", url, version);
        self.execute(move |agent| {
            let response = agent
                .put(&url)
                .header("Authorization", &auth)
                .header("X-Contentful-Version", &version.to_string())
                .send_empty()
                .map_err(transport)?;
            read_body::<WireAsset>(response, Target::Entry(&id, Some(version))).map(Asset::from)
        })
        .await
    }

    async fn list_content_types(&self) -> Result<Vec<ContentTypeDef>, StoreError> {
        let url = format!("{}/content_types", self.environment_url);
        let auth = self.bearer();
        debug!("GET {}", url);
        self.execute(move |agent| {
            let mut defs = Vec::new();
            loop {
                let response = agent
                    .get(&url)
                    .header("Authorization", &auth)
                    .query("skip", defs.len().to_string())
                    .query("limit", CONTENT_TYPE_PAGE.to_string())
                    .call()
                    .map_err(transport)?;
                let page =
                    read_body::<WireCollection<WireContentType>>(response, Target::Collection)?;
                let total = page.total;
                let fetched = page.items.len();
                defs.extend(page.items.into_iter().map(ContentTypeDef::from));
                if fetched == 0 || defs.len() >= total {
                    return Ok(defs);
                }
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_url_trims_trailing_slash() {
        assert_eq!(
            environment_url("https://api.contentful.com/", "sp1", "staging"),
            "https://api.contentful.com/spaces/sp1/environments/staging"
        );
    }

    #[test]
    fn entry_urls() {
        let store = ContentfulStore::new("https://api.contentful.com", "sp1", "master", "tok");
        assert_eq!(
            store.entries_url(),
            "https://api.contentful.com/spaces/sp1/environments/master/entries"
        );
        assert_eq!(
            store.entry_url("abc"),
            "https://api.contentful.com/spaces/sp1/environments/master/entries/abc"
        );
        assert_eq!(store.bearer(), "Bearer tok");
        assert_eq!(
            store.asset_url("as1"),
            "https://api.contentful.com/spaces/sp1/environments/master/assets/as1"
        );
    }

    #[test]
    fn debug_hides_token() {
        let store = ContentfulStore::new("https://api.contentful.com", "sp1", "master", "secret");
        assert!(!format!("{:?}", store).contains("secret"));
    }

    #[tokio::test]
    async fn unreachable_host_is_backend_error_not_missing() {
        let store = ContentfulStore::new("http://127.0.0.1:9", "sp1", "master", "tok");
        let err = store.get_entry("abc").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)), "{err:?}");
        let err = store.get_asset("as1").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)), "{err:?}");
    }
}
