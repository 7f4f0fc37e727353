//! HTTP resource store backed by a flowsim REST server.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use async_trait::async_trait;

use super::{ResourceStore, StoreError};

/// Resource store speaking the flowsim REST shape.
///
/// Resources live under `/api/<type>/<name>`; a GET on `/api/<type>` lists
/// the names known for a type as `{"names": [...]}`.
#[derive(Debug, Clone)]
pub struct HttpStore {
  client: Client,
  base: Url,
  token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
  names: Vec<String>,
}

impl HttpStore {
  pub fn new(base: Url, token: Option<String>) -> Self {
    Self {
      client: Client::new(),
      base,
      token,
    }
  }

  fn endpoint(&self, type_key: &str, name: Option<&str>) -> String {
    let base = self.base.as_str().trim_end_matches('/');
    match name {
      Some(name) => format!("{}/api/{}/{}", base, type_key, name),
      None => format!("{}/api/{}", base, type_key),
    }
  }

  fn request(&self, method: Method, url: String) -> RequestBuilder {
    let request = self.client.request(method, url);
    match &self.token {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  /// Map a non-success response into a store error. A 404 on a named
  /// resource becomes `NotFound`; everything else carries the server's
  /// status and body.
  async fn check(
    response: Response,
    type_key: &str,
    name: Option<&str>,
  ) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
      if let Some(name) = name {
        return Err(StoreError::NotFound {
          type_key: type_key.to_string(),
          name: name.to_string(),
        });
      }
    }

    let message = response.text().await.unwrap_or_default();
    Err(StoreError::Server {
      status: status.as_u16(),
      message,
    })
  }
}

#[async_trait]
impl ResourceStore for HttpStore {
  async fn list(&self, type_key: &str) -> Result<Vec<String>, StoreError> {
    let response = self
      .request(Method::GET, self.endpoint(type_key, None))
      .send()
      .await?;
    let response = Self::check(response, type_key, None).await?;

    let listing: ListResponse = response.json().await?;
    Ok(listing.names)
  }

  async fn fetch(&self, type_key: &str, name: &str) -> Result<Value, StoreError> {
    let response = self
      .request(Method::GET, self.endpoint(type_key, Some(name)))
      .send()
      .await?;
    let response = Self::check(response, type_key, Some(name)).await?;

    Ok(response.json().await?)
  }

  async fn create(&self, type_key: &str, name: &str, payload: Value) -> Result<(), StoreError> {
    let response = self
      .request(Method::POST, self.endpoint(type_key, Some(name)))
      .json(&payload)
      .send()
      .await?;
    Self::check(response, type_key, Some(name)).await?;
    Ok(())
  }

  async fn update(&self, type_key: &str, name: &str, payload: Value) -> Result<(), StoreError> {
    let response = self
      .request(Method::PUT, self.endpoint(type_key, Some(name)))
      .json(&payload)
      .send()
      .await?;
    Self::check(response, type_key, Some(name)).await?;
    Ok(())
  }

  async fn delete(&self, type_key: &str, name: &str) -> Result<(), StoreError> {
    let response = self
      .request(Method::DELETE, self.endpoint(type_key, Some(name)))
      .send()
      .await?;
    Self::check(response, type_key, Some(name)).await?;
    Ok(())
  }
}
