use crate::auth::{Challenge, Credential, CredentialProvider, DockerCredentials, TokenResponse};
use crate::error::RegistryError;
use crate::types::{
    BlobDescriptor, Digest, ImageHandle, ImageReference, ManifestBlob, ManifestIndex,
    RepositoryRef,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION, WWW_AUTHENTICATE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

/// Media types accepted when fetching manifests
const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json,\
application/vnd.oci.image.index.v1+json,\
application/vnd.docker.distribution.manifest.v2+json,\
application/vnd.docker.distribution.manifest.list.v2+json";

/// Fallback when neither the response nor the manifest names its media type
const DEFAULT_MANIFEST_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

const DIGEST_HEADER: &str = "docker-content-digest";

/// Longest response body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// Operations the reconciler needs from a container registry
///
/// Implementations own transport and credential handling; callers only deal
/// with fully qualified references.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Whether the digest-qualified `image` exists
    async fn exists(&self, image: &ImageReference) -> Result<bool, RegistryError>;

    /// Every digest in `repository` with the tags pointing at it
    async fn list_manifests(&self, repository: &RepositoryRef)
        -> Result<ManifestIndex, RegistryError>;

    /// Tags attached to the digest-qualified `image`
    async fn tags_for(&self, image: &ImageReference) -> Result<BTreeSet<String>, RegistryError>;

    /// Fetch what is needed to recreate `image` elsewhere
    async fn pull(&self, image: &ImageReference) -> Result<ImageHandle, RegistryError>;

    /// Make `destination` point at the pulled image
    async fn push(&self, destination: &ImageReference, image: &ImageHandle)
        -> Result<(), RegistryError>;
}

/// OCI distribution API client covering any number of registry hosts
///
/// Every HTTP request (including reading its body) is bounded by the request
/// timeout; composite operations such as a cross-registry push are not.
pub struct HttpRegistry {
    client: reqwest::Client,
    request_timeout: Duration,
    credentials: Arc<dyn CredentialProvider>,
    insecure: HashSet<String>,
    /// Token realm hosts allowed to receive credentials of another registry
    trusted_realms: HashSet<String>,
    /// Authorization header values by (host, scope)
    auth_cache: RwLock<HashMap<(String, String), HeaderValue>>,
    /// Credential lookups by host
    credential_cache: RwLock<HashMap<String, Option<Credential>>>,
}

/// Builder for [`HttpRegistry`]
pub struct HttpRegistryBuilder {
    user_agent: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    insecure: HashSet<String>,
    trusted_realms: HashSet<String>,
    credentials: Arc<dyn CredentialProvider>,
}

impl Default for HttpRegistryBuilder {
    fn default() -> Self {
        Self {
            user_agent: format!("tagsync/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            insecure: HashSet::new(),
            trusted_realms: HashSet::new(),
            credentials: Arc::new(DockerCredentials::from_env()),
        }
    }
}

impl HttpRegistryBuilder {
    /// Talk plain HTTP to `host` (e.g. a local test registry)
    pub fn insecure_registry(mut self, host: impl Into<String>) -> Self {
        self.insecure.insert(host.into());
        self
    }

    /// Replace the default environment/Docker credential lookup
    pub fn credentials(mut self, credentials: impl CredentialProvider + 'static) -> Self {
        self.credentials = Arc::new(credentials);
        self
    }

    /// Allow credentials to be sent to a token realm on `host` even when it
    /// differs from the registry that issued the challenge
    pub fn trust_token_realm(mut self, host: impl Into<String>) -> Self {
        self.trusted_realms.insert(host.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Deadline for a single HTTP request, body included
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpRegistry, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| RegistryError::transport("client", e))?;

        Ok(HttpRegistry {
            client,
            request_timeout: self.request_timeout,
            credentials: self.credentials,
            insecure: self.insecure,
            trusted_realms: self.trusted_realms,
            auth_cache: RwLock::new(HashMap::new()),
            credential_cache: RwLock::new(HashMap::new()),
        })
    }
}

impl HttpRegistry {
    pub fn builder() -> HttpRegistryBuilder {
        HttpRegistryBuilder::default()
    }

    fn base_url(&self, registry: &str) -> String {
        let scheme = if self.insecure.contains(registry) {
            "http"
        } else {
            "https"
        };
        format!("{}://{}", scheme, registry)
    }

    fn url(&self, repository: &RepositoryRef, suffix: &str) -> String {
        format!(
            "{}/v2/{}/{}",
            self.base_url(&repository.registry),
            repository.repository,
            suffix
        )
    }

    /// Send a request, answering one authentication challenge if the registry
    /// issues it. `build` is called again for the retried request.
    async fn send<F>(
        &self,
        repository: &RepositoryRef,
        actions: &str,
        build: F,
    ) -> Result<Response, RegistryError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let scope = format!("repository:{}:{}", repository.repository, actions);
        let cache_key = (repository.registry.clone(), scope.clone());

        let cached = self
            .auth_cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&cache_key).cloned());

        let response = self.dispatch(&build, cached.as_ref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|h| h.to_str().ok())
            .and_then(Challenge::parse);

        let Some(challenge) = challenge else {
            return Ok(response);
        };

        let header = self
            .authorize(&repository.registry, &scope, challenge)
            .await?;

        if let Ok(mut cache) = self.auth_cache.write() {
            cache.insert(cache_key, header.clone());
        }

        self.dispatch(&build, Some(&header)).await
    }

    async fn dispatch<F>(
        &self,
        build: &F,
        auth: Option<&HeaderValue>,
    ) -> Result<Response, RegistryError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut request = build(&self.client).timeout(self.request_timeout);
        if let Some(auth) = auth {
            request = request.header(AUTHORIZATION, auth.clone());
        }

        let request = request
            .build()
            .map_err(|e| RegistryError::transport("request", e))?;
        let url = request.url().to_string();
        trace!("{} {}", request.method(), url);

        self.client
            .execute(request)
            .await
            .map_err(|e| self.transport_error(&url, e))
    }

    /// Map a reqwest failure, reporting an elapsed request deadline as
    /// [`RegistryError::Timeout`]
    fn transport_error(&self, url: &str, err: reqwest::Error) -> RegistryError {
        if err.is_timeout() {
            RegistryError::Timeout {
                operation: format!("request to {}", url),
                after: self.request_timeout,
            }
        } else {
            RegistryError::transport(url, err)
        }
    }

    /// Credential for `registry`, looked up once per host off the async
    /// runtime (the lookup may read files and run credential helpers)
    async fn credential_for(&self, registry: &str) -> Result<Option<Credential>, RegistryError> {
        let cached = self
            .credential_cache
            .read()
            .ok()
            .and_then(|cache| cache.get(registry).cloned());
        if let Some(credential) = cached {
            return Ok(credential);
        }

        let provider = Arc::clone(&self.credentials);
        let host = registry.to_string();
        let credential = tokio::task::spawn_blocking(move || provider.credential_for(&host))
            .await
            .map_err(|e| RegistryError::Auth {
                registry: registry.to_string(),
                message: format!("credential lookup failed: {}", e),
            })?;

        if let Ok(mut cache) = self.credential_cache.write() {
            cache.insert(registry.to_string(), credential.clone());
        }
        Ok(credential)
    }

    /// Whether credentials for `registry` may be sent to `realm`
    fn may_receive_credentials(&self, realm: &Url, registry: &str) -> bool {
        same_authority(realm, registry)
            || realm
                .host_str()
                .is_some_and(|host| self.trusted_realms.contains(host))
            || self.trusted_realms.contains(&authority(realm))
    }

    /// Turn a challenge into an Authorization header value
    async fn authorize(
        &self,
        registry: &str,
        scope: &str,
        challenge: Challenge,
    ) -> Result<HeaderValue, RegistryError> {
        let credential = self.credential_for(registry).await?;

        let value = match challenge {
            Challenge::Basic => {
                let credential = credential.ok_or_else(|| RegistryError::Auth {
                    registry: registry.to_string(),
                    message: "registry requires credentials and none were found".to_string(),
                })?;
                let encoded =
                    STANDARD.encode(format!("{}:{}", credential.username, credential.secret));
                format!("Basic {}", encoded)
            }
            Challenge::Bearer {
                realm,
                service,
                scope: challenge_scope,
            } => {
                let mut token_url = Url::parse(&realm).map_err(|e| RegistryError::Auth {
                    registry: registry.to_string(),
                    message: format!("invalid token realm '{}': {}", realm, e),
                })?;
                {
                    let mut query = token_url.query_pairs_mut();
                    if let Some(service) = &service {
                        query.append_pair("service", service);
                    }
                    query.append_pair("scope", challenge_scope.as_deref().unwrap_or(scope));
                }

                debug!("Requesting token for {} from {}", registry, realm);

                let mut request = self
                    .client
                    .get(token_url.as_str())
                    .timeout(self.request_timeout);
                match &credential {
                    Some(credential) if self.may_receive_credentials(&token_url, registry) => {
                        request =
                            request.basic_auth(&credential.username, Some(&credential.secret));
                    }
                    Some(_) => warn!(
                        "Not sending {} credentials to token realm on another host ({}); \
                         requesting an anonymous token",
                        registry,
                        authority(&token_url)
                    ),
                    None => {}
                }

                let response = request
                    .send()
                    .await
                    .map_err(|e| self.transport_error(token_url.as_str(), e))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(RegistryError::Auth {
                        registry: registry.to_string(),
                        message: format!("token request returned {}: {}", status, truncate(&body)),
                    });
                }

                let token = response
                    .json::<TokenResponse>()
                    .await
                    .ok()
                    .and_then(TokenResponse::into_token)
                    .ok_or_else(|| RegistryError::Auth {
                        registry: registry.to_string(),
                        message: "token response did not contain a token".to_string(),
                    })?;

                format!("Bearer {}", token)
            }
        };

        HeaderValue::from_str(&value).map_err(|e| RegistryError::Auth {
            registry: registry.to_string(),
            message: format!("unusable credentials: {}", e),
        })
    }

    async fn fetch_manifest(
        &self,
        repository: &RepositoryRef,
        digest: &Digest,
    ) -> Result<ManifestBlob, RegistryError> {
        let url = self.url(repository, &format!("manifests/{}", digest));
        let response = self
            .send(repository, "pull", |c| c.get(&url).header(ACCEPT, MANIFEST_ACCEPT))
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound {
                reference: repository.at_digest(digest).to_string(),
            });
        }
        let response = expect_success("GET", &url, response).await?;

        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.split(';').next().unwrap_or(s).trim().to_string());

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(&url, e))?
            .to_vec();

        let media_type = header_type
            .filter(|t| t.starts_with("application/vnd."))
            .or_else(|| {
                serde_json::from_slice::<ManifestDocument>(&body)
                    .ok()
                    .and_then(|m| m.media_type)
            })
            .unwrap_or_else(|| DEFAULT_MANIFEST_TYPE.to_string());

        Ok(ManifestBlob {
            digest: digest.clone(),
            media_type,
            body,
        })
    }

    async fn put_manifest(
        &self,
        repository: &RepositoryRef,
        reference: &str,
        manifest: &ManifestBlob,
    ) -> Result<(), RegistryError> {
        let url = self.url(repository, &format!("manifests/{}", reference));
        debug!("Pushing manifest {} to {}:{}", manifest.digest, repository, reference);

        let response = self
            .send(repository, "pull,push", |c| {
                c.put(&url)
                    .header(CONTENT_TYPE, manifest.media_type.as_str())
                    .body(manifest.body.clone())
            })
            .await?;

        expect_success("PUT", &url, response).await.map(|_| ())
    }

    /// Make sure `blob` exists in `destination`, copying it from `source`
    async fn ensure_blob(
        &self,
        source: &RepositoryRef,
        destination: &RepositoryRef,
        blob: &BlobDescriptor,
    ) -> Result<(), RegistryError> {
        let head_url = self.url(destination, &format!("blobs/{}", blob.digest));
        let response = self
            .send(destination, "pull,push", |c| c.head(&head_url))
            .await?;
        if response.status().is_success() {
            trace!("Blob {} already present in {}", blob.digest, destination);
            return Ok(());
        }

        // A refused mount answers 202 with an upload session we can reuse
        let mut session = None;
        if source.registry == destination.registry {
            let mount_url = self.url(
                destination,
                &format!(
                    "blobs/uploads/?mount={}&from={}",
                    blob.digest, source.repository
                ),
            );
            let response = self
                .send(destination, "pull,push", |c| c.post(&mount_url))
                .await?;
            if response.status() == StatusCode::CREATED {
                debug!("Mounted blob {} from {} into {}", blob.digest, source, destination);
                return Ok(());
            }
            trace!(
                "Mount of {} not possible ({}), uploading instead",
                blob.digest,
                response.status()
            );
            if response.status() == StatusCode::ACCEPTED {
                session = upload_location(&mount_url, &response).ok();
            }
        }

        let get_url = self.url(source, &format!("blobs/{}", blob.digest));
        let response = self.send(source, "pull", |c| c.get(&get_url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound {
                reference: format!("{}@{}", source, blob.digest),
            });
        }
        let content = expect_success("GET", &get_url, response)
            .await?
            .bytes()
            .await
            .map_err(|e| self.transport_error(&get_url, e))?;

        debug!(
            "Uploading blob {} ({} bytes) to {}",
            blob.digest,
            content.len(),
            destination
        );

        let mut upload_url = match session {
            Some(location) => location,
            None => {
                let start_url = self.url(destination, "blobs/uploads/");
                let response = self
                    .send(destination, "pull,push", |c| c.post(&start_url))
                    .await?;
                let response = expect_success("POST", &start_url, response).await?;
                upload_location(&start_url, &response)?
            }
        };
        upload_url
            .query_pairs_mut()
            .append_pair("digest", &blob.digest);
        let upload_url = upload_url.to_string();

        let response = self
            .send(destination, "pull,push", |c| {
                c.put(&upload_url)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(content.clone())
            })
            .await?;

        expect_success("PUT", &upload_url, response).await.map(|_| ())
    }

    /// Resolve each tag to its digest when the registry has no digest index
    async fn index_by_tag(
        &self,
        repository: &RepositoryRef,
        tags: &[String],
    ) -> Result<ManifestIndex, RegistryError> {
        let mut index = ManifestIndex::new();

        for tag in tags {
            let url = self.url(repository, &format!("manifests/{}", tag));
            let response = self
                .send(repository, "pull", |c| c.head(&url).header(ACCEPT, MANIFEST_ACCEPT))
                .await?;
            let response = expect_success("HEAD", &url, response).await?;

            let digest = response
                .headers()
                .get(DIGEST_HEADER)
                .and_then(|h| h.to_str().ok())
                .ok_or_else(|| RegistryError::Malformed {
                    url: url.clone(),
                    message: "missing Docker-Content-Digest header".to_string(),
                })?;

            index.insert(Digest::parse(digest)?, [tag.clone()]);
        }

        Ok(index)
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn exists(&self, image: &ImageReference) -> Result<bool, RegistryError> {
        let repository = image.repository_ref();
        let url = self.url(&repository, &format!("manifests/{}", image.reference));

        let response = self
            .send(&repository, "pull", |c| c.head(&url).header(ACCEPT, MANIFEST_ACCEPT))
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error("HEAD", &url, response).await),
        }
    }

    async fn list_manifests(
        &self,
        repository: &RepositoryRef,
    ) -> Result<ManifestIndex, RegistryError> {
        let mut url = self.url(repository, "tags/list?n=1000");
        let base = self.base_url(&repository.registry);

        let mut index = ManifestIndex::new();
        let mut all_tags = Vec::new();
        let mut has_digest_index = false;

        loop {
            debug!("Listing tags from: {}", url);

            let response = self.send(repository, "pull", |c| c.get(&url)).await?;
            if response.status() == StatusCode::NOT_FOUND {
                debug!("Repository {} does not exist yet", repository);
                return Ok(ManifestIndex::new());
            }
            let response = expect_success("GET", &url, response).await?;

            let next_url = response
                .headers()
                .get("link")
                .and_then(|h| h.to_str().ok())
                .and_then(|link| parse_link_header(link, &base));

            let page: TagListResponse =
                response.json().await.map_err(|e| RegistryError::Malformed {
                    url: url.clone(),
                    message: e.to_string(),
                })?;

            all_tags.extend(page.tags.unwrap_or_default());

            if let Some(manifests) = page.manifest {
                has_digest_index = true;
                for (digest, entry) in manifests {
                    match Digest::parse(&digest) {
                        Ok(digest) => index.insert(digest, entry.tag),
                        Err(_) => trace!("Skipping non-sha256 manifest {}", digest),
                    }
                }
            }

            match next_url {
                Some(next) => url = next,
                None => break,
            }
        }

        if !has_digest_index {
            index = self.index_by_tag(repository, &all_tags).await?;
        }

        trace!("Found {} manifests in {}", index.len(), repository);
        Ok(index)
    }

    async fn tags_for(&self, image: &ImageReference) -> Result<BTreeSet<String>, RegistryError> {
        let digest = image.digest().ok_or_else(|| RegistryError::InvalidDigest {
            value: image.reference.to_string(),
        })?;
        let index = self.list_manifests(&image.repository_ref()).await?;
        Ok(index.tags_for(digest))
    }

    async fn pull(&self, image: &ImageReference) -> Result<ImageHandle, RegistryError> {
        let digest = image.digest().ok_or_else(|| RegistryError::InvalidDigest {
            value: image.reference.to_string(),
        })?;
        let repository = image.repository_ref();

        let root = self.fetch_manifest(&repository, digest).await?;
        let root_doc = parse_manifest(&root, &repository)?;

        let mut handle = ImageHandle::new(image.clone(), root);
        let mut seen_blobs = HashSet::new();
        collect_blobs(&root_doc, &mut handle.blobs, &mut seen_blobs);

        for child in &root_doc.manifests {
            let child_digest = Digest::parse(&child.digest)?;
            let blob = self.fetch_manifest(&repository, &child_digest).await?;
            let child_doc = parse_manifest(&blob, &repository)?;
            collect_blobs(&child_doc, &mut handle.blobs, &mut seen_blobs);
            handle.children.push(blob);
        }

        debug!(
            "Pulled {} ({} child manifests, {} blobs)",
            image,
            handle.children.len(),
            handle.blobs.len()
        );
        Ok(handle)
    }

    async fn push(
        &self,
        destination: &ImageReference,
        image: &ImageHandle,
    ) -> Result<(), RegistryError> {
        let source_repo = image.source.repository_ref();
        let dest_repo = destination.repository_ref();

        if source_repo != dest_repo {
            for blob in &image.blobs {
                self.ensure_blob(&source_repo, &dest_repo, blob).await?;
            }
            for child in &image.children {
                self.put_manifest(&dest_repo, &child.digest.to_string(), child)
                    .await?;
            }
        }

        self.put_manifest(&dest_repo, &destination.reference.to_string(), &image.root)
            .await
    }
}

/// Absolute upload URL from the `Location` of an upload session response
fn upload_location(request_url: &str, response: &Response) -> Result<Url, RegistryError> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| RegistryError::Malformed {
            url: request_url.to_string(),
            message: "upload response has no Location header".to_string(),
        })?;

    Url::parse(request_url)
        .and_then(|base| base.join(location))
        .map_err(|e| RegistryError::Malformed {
            url: request_url.to_string(),
            message: format!("invalid upload location '{}': {}", location, e),
        })
}

/// `host[:port]` of a URL, port only when explicit
fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Whether `url` points at the registry host `registry` (`host[:port]`)
fn same_authority(url: &Url, registry: &str) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    authority(url).eq_ignore_ascii_case(registry)
        || url
            .port_or_known_default()
            .is_some_and(|port| format!("{}:{}", host, port).eq_ignore_ascii_case(registry))
}

fn parse_manifest(
    blob: &ManifestBlob,
    repository: &RepositoryRef,
) -> Result<ManifestDocument, RegistryError> {
    serde_json::from_slice(&blob.body).map_err(|e| RegistryError::Malformed {
        url: repository.at_digest(&blob.digest).to_string(),
        message: format!("unreadable manifest: {}", e),
    })
}

fn collect_blobs(
    doc: &ManifestDocument,
    blobs: &mut Vec<BlobDescriptor>,
    seen: &mut HashSet<String>,
) {
    for descriptor in doc.config.iter().chain(doc.layers.iter()) {
        if seen.insert(descriptor.digest.clone()) {
            blobs.push(BlobDescriptor {
                digest: descriptor.digest.clone(),
                size: descriptor.size,
            });
        }
    }
}

async fn expect_success(
    method: &str,
    url: &str,
    response: Response,
) -> Result<Response, RegistryError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(status_error(method, url, response).await)
    }
}

async fn status_error(method: &str, url: &str, response: Response) -> RegistryError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    RegistryError::Status {
        method: method.to_string(),
        url: url.to_string(),
        status,
        body: if body.is_empty() {
            "(no response body)".to_string()
        } else {
            truncate(&body)
        },
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Parse Link header for pagination
/// Format: <https://gcr.io/v2/repo/tags/list?n=100&last=tag>; rel="next"
fn parse_link_header(link: &str, base_url: &str) -> Option<String> {
    for part in link.split(',') {
        let part = part.trim();
        if part.contains("rel=\"next\"") {
            let start = part.find('<')? + 1;
            let end = start + part[start..].find('>')?;
            let url = &part[start..end];
            if url.starts_with('/') {
                return Some(format!("{}{}", base_url, url));
            }
            return Some(url.to_string());
        }
    }
    None
}

// Internal types for registry API responses

#[derive(Debug, Deserialize)]
struct TagListResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
    /// Digest index returned by Google Container Registry and Artifact Registry
    #[serde(default)]
    manifest: Option<HashMap<String, DigestEntry>>,
}

#[derive(Debug, Deserialize)]
struct DigestEntry {
    #[serde(default)]
    tag: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestDocument {
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    config: Option<Descriptor>,
    #[serde(default)]
    layers: Vec<Descriptor>,
    #[serde(default)]
    manifests: Vec<Descriptor>,
}

#[derive(Debug, Deserialize)]
struct Descriptor {
    digest: String,
    #[serde(default)]
    size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_header() {
        let link = r#"</v2/foo/bar/tags/list?n=2&last=b>; rel="next""#;
        assert_eq!(
            parse_link_header(link, "https://gcr.io"),
            Some("https://gcr.io/v2/foo/bar/tags/list?n=2&last=b".to_string())
        );
        assert_eq!(parse_link_header(r#"<x>; rel="prev""#, "https://gcr.io"), None);
    }

    #[test]
    fn test_parse_link_header_rejects_malformed_values() {
        assert_eq!(parse_link_header(r#">x<; rel="next""#, "https://gcr.io"), None);
        assert_eq!(parse_link_header(r#"<x; rel="next""#, "https://gcr.io"), None);
        assert_eq!(parse_link_header(r#"rel="next""#, "https://gcr.io"), None);
        assert_eq!(
            parse_link_header(r#">, <https://r.io/v2/a/tags/list?last=b>; rel="next""#, "https://gcr.io"),
            Some("https://r.io/v2/a/tags/list?last=b".to_string())
        );
    }

    #[test]
    fn test_same_authority() {
        let gcr = Url::parse("https://gcr.io/v2/token").unwrap();
        assert!(same_authority(&gcr, "gcr.io"));
        assert!(same_authority(&gcr, "gcr.io:443"));
        assert!(!same_authority(&gcr, "eu.gcr.io"));

        let local = Url::parse("http://127.0.0.1:5000/token").unwrap();
        assert!(same_authority(&local, "127.0.0.1:5000"));
        assert!(!same_authority(&local, "127.0.0.1:5001"));
    }

    #[test]
    fn test_insecure_hosts_use_http() {
        let registry = HttpRegistry::builder()
            .insecure_registry("localhost:5000")
            .credentials(crate::auth::Anonymous)
            .build()
            .unwrap();

        assert_eq!(registry.base_url("localhost:5000"), "http://localhost:5000");
        assert_eq!(registry.base_url("gcr.io"), "https://gcr.io");
        assert_eq!(
            registry.url(&RepositoryRef::new("gcr.io", "foo/bar"), "tags/list"),
            "https://gcr.io/v2/foo/bar/tags/list"
        );
    }

    #[test]
    fn test_collect_blobs_dedupes() {
        let doc: ManifestDocument = serde_json::from_str(
            r#"{
                "schemaVersion": 2,
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "config": {"digest": "sha256:c", "size": 10},
                "layers": [{"digest": "sha256:l1", "size": 20}, {"digest": "sha256:c", "size": 10}]
            }"#,
        )
        .unwrap();

        let mut blobs = Vec::new();
        let mut seen = HashSet::new();
        collect_blobs(&doc, &mut blobs, &mut seen);
        collect_blobs(&doc, &mut blobs, &mut seen);

        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].digest, "sha256:c");
    }

    #[test]
    fn test_truncate_long_bodies() {
        let body = "x".repeat(2000);
        let short = truncate(&body);
        assert!(short.len() < 600);
        assert!(short.ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }
}
