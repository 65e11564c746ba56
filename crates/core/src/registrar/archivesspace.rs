//! ArchivesSpace API client.
//!
//! Each `register` call logs in, resolves the archival object carrying the
//! bundle id as its ref id, then updates or creates the digital object whose
//! `digital_object_id` is the bundle id. File versions are replaced wholesale
//! so a repeated call converges on the same record.
//!
//! `describe` resolves the same archival object and walks its ancestors up to
//! the resource for the closest dates.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::config::ArchivesSpaceConfig;
use super::dates::DateRange;
use super::error::{RegistrationError, RegistrationErrorKind};
use super::traits::MetadataRegistrar;
use super::types::{ArchivalDescription, DeliveredLocations, RegistrationResult};
use crate::derivative::ArtifactClass;
use crate::locator::Bundle;

const SESSION_HEADER: &str = "X-ArchivesSpace-Session";

/// Registrar backed by the ArchivesSpace backend API.
pub struct ArchivesSpaceRegistrar {
    client: Client,
    base_url: String,
    repository: String,
    username: String,
    password: String,
}

impl ArchivesSpaceRegistrar {
    pub fn new(config: &ArchivesSpaceConfig) -> Result<Self, RegistrationError> {
        let client = Client::builder()
            .user_agent(concat!("avpackager/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                RegistrationError::new(
                    RegistrationErrorKind::Rejected,
                    format!("failed to build HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            repository: config.repository.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn repo_path(&self, rest: &str) -> String {
        format!("/repositories/{}/{}", self.repository, rest)
    }

    async fn login(&self) -> Result<String, RegistrationError> {
        let url = self.url(&format!("/users/{}/login", urlencoding::encode(&self.username)));
        let response = self
            .client
            .post(&url)
            .query(&[("password", self.password.as_str())])
            .send()
            .await?;
        let response = check_status(response, "login").await?;
        let login: LoginResponse = response.json().await?;
        Ok(login.session)
    }

    async fn get_json(
        &self,
        session: &str,
        request: RequestBuilder,
        what: &str,
    ) -> Result<Value, RegistrationError> {
        let response = request.header(SESSION_HEADER, session).send().await?;
        let response = check_status(response, what).await?;
        Ok(response.json().await?)
    }

    async fn post_json(
        &self,
        session: &str,
        path: &str,
        body: &Value,
        what: &str,
    ) -> Result<UpdateResponse, RegistrationError> {
        let response = self
            .client
            .post(self.url(path))
            .header(SESSION_HEADER, session)
            .json(body)
            .send()
            .await?;
        let response = check_status(response, what).await?;
        Ok(response.json().await?)
    }

    /// Returns the single ref matching `find_by_id`, or `None` when empty.
    async fn find_by_id(
        &self,
        session: &str,
        record_type: &str,
        field: &str,
        id: &str,
    ) -> Result<Option<String>, RegistrationError> {
        let request = self
            .client
            .get(self.url(&self.repo_path(&format!("find_by_id/{}", record_type))))
            .query(&[(format!("{}[]", field), id)]);
        let body = self.get_json(session, request, record_type).await?;

        let refs: Vec<String> = body
            .get(record_type)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("ref").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        match refs.len() {
            0 => Ok(None),
            1 => Ok(refs.into_iter().next()),
            n => Err(RegistrationError::new(
                RegistrationErrorKind::Rejected,
                format!("{} {} records match {}", n, record_type, id),
            )),
        }
    }

    /// URI and body of the archival object whose ref id is the bundle id.
    async fn archival_object(
        &self,
        session: &str,
        bundle: &Bundle,
    ) -> Result<(String, Value), RegistrationError> {
        let uri = self
            .find_by_id(session, "archival_objects", "ref_id", &bundle.id)
            .await?
            .ok_or_else(|| {
                RegistrationError::new(
                    RegistrationErrorKind::RecordNotFound,
                    format!("no archival object with ref id {}", bundle.id),
                )
            })?;
        let record = self
            .get_json(session, self.client.get(self.url(&uri)), "archival object")
            .await?;
        Ok((uri, record))
    }

    /// Dates of `record`, else of its nearest ancestor that has any.
    async fn closest_dates(
        &self,
        session: &str,
        record: &Value,
    ) -> Result<Option<DateRange>, RegistrationError> {
        if let Some(range) = DateRange::from_record(record) {
            return Ok(Some(range));
        }

        let ancestors: Vec<&str> = record
            .get("ancestors")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("ref").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();

        for ancestor in ancestors {
            let body = self
                .get_json(session, self.client.get(self.url(ancestor)), "ancestor")
                .await?;
            if let Some(range) = DateRange::from_record(&body) {
                debug!("Dates taken from ancestor {}", ancestor);
                return Ok(Some(range));
            }
        }
        Ok(None)
    }

    async fn link_instance(
        &self,
        session: &str,
        archival_object_uri: &str,
        mut archival_object: Value,
        digital_object_uri: &str,
    ) -> Result<(), RegistrationError> {
        if has_instance(&archival_object, digital_object_uri) {
            debug!("{} already linked to {}", archival_object_uri, digital_object_uri);
            return Ok(());
        }

        let instance = json!({
            "jsonmodel_type": "instance",
            "instance_type": "digital_object",
            "digital_object": { "ref": digital_object_uri },
        });
        match archival_object.get_mut("instances").and_then(Value::as_array_mut) {
            Some(instances) => instances.push(instance),
            None => archival_object["instances"] = json!([instance]),
        }

        self.post_json(session, archival_object_uri, &archival_object, "archival object")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataRegistrar for ArchivesSpaceRegistrar {
    fn name(&self) -> &str {
        "archivesspace"
    }

    async fn describe(&self, bundle: &Bundle) -> Result<ArchivalDescription, RegistrationError> {
        let session = self.login().await?;
        let (uri, record) = self.archival_object(&session, bundle).await?;
        let dates = self.closest_dates(&session, &record).await?;
        if dates.is_none() {
            warn!("No dates on {} or its ancestors", uri);
        }
        Ok(ArchivalDescription { uri, dates })
    }

    async fn register(
        &self,
        bundle: &Bundle,
        locations: &DeliveredLocations,
    ) -> Result<RegistrationResult, RegistrationError> {
        let session = self.login().await?;
        let (archival_object_uri, archival_object) = self.archival_object(&session, bundle).await?;

        let file_versions = file_versions(locations);
        let existing = self
            .find_by_id(&session, "digital_objects", "digital_object_id", &bundle.id)
            .await?;

        let (record_uri, created) = match existing {
            Some(uri) => {
                let mut record = self
                    .get_json(&session, self.client.get(self.url(&uri)), "digital object")
                    .await?;
                if record.get("file_versions") == Some(&file_versions) {
                    debug!("{} already carries the delivered locations", uri);
                } else {
                    record["file_versions"] = file_versions;
                    self.post_json(&session, &uri, &record, "digital object").await?;
                }
                (uri, false)
            }
            None => {
                let title = archival_object
                    .get("title")
                    .or_else(|| archival_object.get("display_string"))
                    .and_then(Value::as_str)
                    .unwrap_or(bundle.id.as_str())
                    .to_string();
                let record = json!({
                    "jsonmodel_type": "digital_object",
                    "title": title,
                    "digital_object_id": bundle.id,
                    "publish": false,
                    "file_versions": file_versions,
                });
                let created = self
                    .post_json(&session, &self.repo_path("digital_objects"), &record, "digital object")
                    .await?;
                let uri = created.uri.ok_or_else(|| {
                    RegistrationError::new(
                        RegistrationErrorKind::Rejected,
                        "create response carried no uri",
                    )
                })?;
                (uri, true)
            }
        };

        self.link_instance(&session, &archival_object_uri, archival_object, &record_uri)
            .await?;

        Ok(RegistrationResult {
            record_uri,
            parent_uri: archival_object_uri,
            created,
        })
    }
}

/// Maps an error status to a registration error kind.
async fn check_status(response: Response, what: &str) -> Result<Response, RegistrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let kind = classify_status(status);
    if kind == RegistrationErrorKind::Unreachable {
        warn!("ArchivesSpace {} returned {}", what, status);
    }
    Err(RegistrationError::new(
        kind,
        format!("{} returned {}: {}", what, status.as_u16(), body.trim()),
    ))
}

fn classify_status(status: StatusCode) -> RegistrationErrorKind {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RegistrationErrorKind::AuthFailure,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            RegistrationErrorKind::Unreachable
        }
        s if s.is_server_error() => RegistrationErrorKind::Unreachable,
        _ => RegistrationErrorKind::Rejected,
    }
}

fn use_statement(class: ArtifactClass) -> Option<&'static str> {
    match class {
        ArtifactClass::Poster => Some("image-thumbnail"),
        ArtifactClass::AudioAccess => Some("audio-service"),
        ArtifactClass::VideoAccess => Some("video-service"),
        ArtifactClass::VideoMezzanine => Some("video-master"),
        ArtifactClass::Package => None,
    }
}

fn file_versions(locations: &DeliveredLocations) -> Value {
    let versions: Vec<Value> = locations
        .iter()
        .filter_map(|(class, location)| {
            use_statement(*class).map(|statement| {
                json!({
                    "jsonmodel_type": "file_version",
                    "file_uri": location.uri(),
                    "use_statement": statement,
                    "publish": false,
                })
            })
        })
        .collect();
    Value::Array(versions)
}

fn has_instance(archival_object: &Value, digital_object_uri: &str) -> bool {
    archival_object
        .get("instances")
        .and_then(Value::as_array)
        .map(|instances| {
            instances.iter().any(|instance| {
                instance
                    .pointer("/digital_object/ref")
                    .and_then(Value::as_str)
                    == Some(digital_object_uri)
            })
        })
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session: String,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    #[serde(default)]
    uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::RemoteLocation;
    use std::path::PathBuf;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AO: &str = "/repositories/2/archival_objects/42";
    const DO: &str = "/repositories/2/digital_objects/7";

    fn registrar(server: &MockServer) -> ArchivesSpaceRegistrar {
        let config = ArchivesSpaceConfig::new(server.uri(), "2", "packager", "secret");
        ArchivesSpaceRegistrar::new(&config).unwrap()
    }

    fn bundle() -> Bundle {
        Bundle::new("abc123", PathBuf::from("/src/abc123"))
    }

    fn locations() -> DeliveredLocations {
        let mut locations = DeliveredLocations::new();
        for class in ArtifactClass::DERIVATIVES {
            locations.insert(
                class,
                RemoteLocation::new(format!("{}-bucket", class.as_str()), class.remote_key("abc123")),
            );
        }
        locations
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/users/packager/login"))
            .and(query_param("password", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "session": "tok" })))
            .mount(server)
            .await;
    }

    async fn mount_archival_object(server: &MockServer, instances: Value) {
        Mock::given(method("GET"))
            .and(path("/repositories/2/find_by_id/archival_objects"))
            .and(query_param("ref_id[]", "abc123"))
            .and(header(SESSION_HEADER, "tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "archival_objects": [{ "ref": AO }]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(AO))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uri": AO,
                "title": "Oral history interview",
                "lock_version": 3,
                "instances": instances,
            })))
            .mount(server)
            .await;
    }

    async fn mount_digital_object_lookup(server: &MockServer, refs: Value) {
        Mock::given(method("GET"))
            .and(path("/repositories/2/find_by_id/digital_objects"))
            .and(query_param("digital_object_id[]", "abc123"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "digital_objects": refs })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_creates_and_links_digital_object() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_archival_object(&server, json!([])).await;
        mount_digital_object_lookup(&server, json!([])).await;

        Mock::given(method("POST"))
            .and(path("/repositories/2/digital_objects"))
            .and(body_partial_json(json!({
                "digital_object_id": "abc123",
                "title": "Oral history interview",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Created", "id": 7, "uri": DO
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(AO))
            .and(body_partial_json(json!({
                "lock_version": 3,
                "instances": [{ "instance_type": "digital_object", "digital_object": { "ref": DO } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Updated", "uri": AO
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = registrar(&server)
            .register(&bundle(), &locations())
            .await
            .unwrap();

        assert_eq!(result.record_uri, DO);
        assert_eq!(result.parent_uri, AO);
        assert!(result.created);
    }

    #[tokio::test]
    async fn test_existing_record_with_same_locations_is_untouched() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        let linked = json!([{
            "jsonmodel_type": "instance",
            "instance_type": "digital_object",
            "digital_object": { "ref": DO }
        }]);
        mount_archival_object(&server, linked).await;
        mount_digital_object_lookup(&server, json!([{ "ref": DO }])).await;

        Mock::given(method("GET"))
            .and(path(DO))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uri": DO,
                "digital_object_id": "abc123",
                "file_versions": file_versions(&locations()),
            })))
            .mount(&server)
            .await;
        for unchanged in [DO, AO] {
            Mock::given(method("POST"))
                .and(path(unchanged))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&server)
                .await;
        }

        let result = registrar(&server)
            .register(&bundle(), &locations())
            .await
            .unwrap();

        assert_eq!(result.record_uri, DO);
        assert!(!result.created);
    }

    #[tokio::test]
    async fn test_existing_record_gets_file_versions_replaced() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        let linked = json!([{ "digital_object": { "ref": DO } }]);
        mount_archival_object(&server, linked).await;
        mount_digital_object_lookup(&server, json!([{ "ref": DO }])).await;

        Mock::given(method("GET"))
            .and(path(DO))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uri": DO,
                "lock_version": 1,
                "file_versions": [{ "file_uri": "s3://old/abc123.mp4" }],
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(DO))
            .and(body_partial_json(json!({ "lock_version": 1 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Updated", "uri": DO
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = registrar(&server)
            .register(&bundle(), &locations())
            .await
            .unwrap();
        assert!(!result.created);
    }

    #[tokio::test]
    async fn test_describe_takes_dates_from_closest_ancestor() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/repositories/2/find_by_id/archival_objects"))
            .and(query_param("ref_id[]", "abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "archival_objects": [{ "ref": AO }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(AO))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uri": AO,
                "dates": [],
                "ancestors": [
                    { "ref": "/repositories/2/archival_objects/41", "level": "series" },
                    { "ref": "/repositories/2/resources/5", "level": "collection" },
                ],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/2/archival_objects/41"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dates": [{ "date_type": "inclusive", "begin": "1962-03", "end": "1975" }],
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repositories/2/resources/5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dates": [{ "date_type": "inclusive", "begin": "1900", "end": "2000" }],
            })))
            .expect(0)
            .mount(&server)
            .await;

        let description = registrar(&server).describe(&bundle()).await.unwrap();

        assert_eq!(description.uri, AO);
        let dates = description.dates.unwrap();
        assert_eq!(dates.start.to_string(), "1962-03-01");
        assert_eq!(dates.end.to_string(), "1975-12-31");
    }

    #[tokio::test]
    async fn test_describe_without_dates() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        mount_archival_object(&server, json!([])).await;

        let description = registrar(&server).describe(&bundle()).await.unwrap();
        assert_eq!(description.uri, AO);
        assert!(description.dates.is_none());
    }

    #[tokio::test]
    async fn test_missing_archival_object_is_record_not_found() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/repositories/2/find_by_id/archival_objects"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "archival_objects": [] })),
            )
            .mount(&server)
            .await;

        let err = registrar(&server)
            .register(&bundle(), &locations())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RegistrationErrorKind::RecordNotFound);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_refused_login_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/packager/login"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Login failed"))
            .mount(&server)
            .await;

        let err = registrar(&server)
            .register(&bundle(), &locations())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RegistrationErrorKind::AuthFailure);
    }

    #[tokio::test]
    async fn test_server_error_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/packager/login"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = registrar(&server)
            .register(&bundle(), &locations())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RegistrationErrorKind::Unreachable);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let config = ArchivesSpaceConfig::new("http://127.0.0.1:9", "2", "packager", "secret");
        let err = ArchivesSpaceRegistrar::new(&config)
            .unwrap()
            .register(&bundle(), &locations())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), RegistrationErrorKind::Unreachable);
    }

    #[test]
    fn test_package_is_not_a_file_version() {
        let mut all = locations();
        all.insert(
            ArtifactClass::Package,
            RemoteLocation::new("pkg", "abc123.tar.gz"),
        );
        let versions = file_versions(&all);
        assert_eq!(versions.as_array().unwrap().len(), 4);
        assert!(!versions.to_string().contains("tar.gz"));
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), RegistrationErrorKind::AuthFailure);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY), RegistrationErrorKind::Unreachable);
        assert_eq!(classify_status(StatusCode::CONFLICT), RegistrationErrorKind::Rejected);
    }
}
