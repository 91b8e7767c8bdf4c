use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use baton_protocol::{Call, CallError, Caller, Headers, Method, Request, ResponseWriter};
use baton_refs::Store;
use baton_specs::{CustomFunctions, MethodDescriptor, Options, Property, Service};
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::{ENDPOINT_OPTION, Endpoint, HOST_OPTION, METHOD_OPTION, TRANSPORT};

/// Inbound headers describing the inbound connection, never forwarded.
const SKIPPED_HEADERS: [&str; 4] = ["connection", "content-length", "host", "transfer-encoding"];

/// Caller dialing services over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpCaller {
  client: Client,
}

impl HttpCaller {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_client(client: Client) -> Self {
    Self { client }
  }
}

impl Caller for HttpCaller {
  fn name(&self) -> &str {
    TRANSPORT
  }

  fn dial(
    &self,
    service: &Service,
    functions: &CustomFunctions,
    options: &Options,
  ) -> Result<Arc<dyn Call>, CallError> {
    let host = service
      .options
      .get(HOST_OPTION)
      .or_else(|| options.get(HOST_OPTION))
      .ok_or_else(|| CallError::InvalidOption {
        option: HOST_OPTION.to_string(),
        message: format!("service '{}' does not define a host", service.name),
      })?;

    let host = Url::parse(host).map_err(|err| CallError::Dial {
      service: service.name.clone(),
      message: format!("invalid host '{host}': {err}"),
    })?;

    let methods = service
      .methods
      .iter()
      .map(|descriptor| HttpMethod::new(&service.name, descriptor, functions))
      .collect::<Result<Vec<_>, _>>()?;

    info!(service = %service.name, host = %host, methods = methods.len(), "dialed http service");

    Ok(Arc::new(HttpCall {
      service: service.name.clone(),
      host,
      client: self.client.clone(),
      methods,
      closed: AtomicBool::new(false),
    }))
  }
}

/// A method of an HTTP service.
#[derive(Debug, Clone)]
pub struct HttpMethod {
  name: String,
  verb: reqwest::Method,
  endpoint: Endpoint,
  references: Vec<Property>,
}

impl HttpMethod {
  fn new(
    service: &str,
    descriptor: &MethodDescriptor,
    functions: &CustomFunctions,
  ) -> Result<Self, CallError> {
    let verb = descriptor
      .options
      .get(METHOD_OPTION)
      .map(|verb| verb.to_uppercase())
      .unwrap_or_else(|| "GET".to_string());

    let verb = reqwest::Method::from_bytes(verb.as_bytes()).map_err(|err| {
      CallError::InvalidOption {
        option: METHOD_OPTION.to_string(),
        message: format!("{service}.{}: {err}", descriptor.name),
      }
    })?;

    let raw = descriptor
      .options
      .get(ENDPOINT_OPTION)
      .map(String::as_str)
      .unwrap_or_default();
    let endpoint = Endpoint::parse(&descriptor.name, raw, functions)?;
    debug!(
      service = %service,
      method = %descriptor.name,
      verb = %verb,
      endpoint = %raw,
      templates = endpoint.templates().count(),
      "parsed http method"
    );

    let references = descriptor
      .output
      .as_ref()
      .map(|output| output.leaves().into_iter().cloned().collect())
      .unwrap_or_default();

    Ok(Self {
      name: descriptor.name.clone(),
      verb,
      endpoint,
      references,
    })
  }
}

impl Method for HttpMethod {
  fn name(&self) -> &str {
    &self.name
  }

  fn references(&self) -> Vec<&Property> {
    self.references.iter().collect()
  }
}

/// A dialed HTTP service.
#[derive(Debug)]
pub struct HttpCall {
  service: String,
  host: Url,
  client: Client,
  methods: Vec<HttpMethod>,
  closed: AtomicBool,
}

impl HttpCall {
  fn url(&self, endpoint: &str) -> Result<Url, CallError> {
    if endpoint.is_empty() {
      return Ok(self.host.clone());
    }

    let raw = format!(
      "{}/{}",
      self.host.as_str().trim_end_matches('/'),
      endpoint.trim_start_matches('/')
    );

    Url::parse(&raw).map_err(|err| CallError::InvalidOption {
      option: ENDPOINT_OPTION.to_string(),
      message: format!("invalid url '{raw}': {err}"),
    })
  }

  async fn exchange(
    &self,
    builder: reqwest::RequestBuilder,
  ) -> Result<(reqwest::StatusCode, Headers, Bytes), CallError> {
    let response = builder.send().await.map_err(CallError::transport)?;
    let status = response.status();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(key, value)| {
        value
          .to_str()
          .ok()
          .map(|value| (key.as_str().to_string(), value.to_string()))
      })
      .collect();
    let body = response.bytes().await.map_err(CallError::transport)?;

    Ok((status, headers, body))
  }
}

#[async_trait]
impl Call for HttpCall {
  fn methods(&self) -> Vec<&dyn Method> {
    self.methods.iter().map(|method| method as &dyn Method).collect()
  }

  fn method(&self, name: &str) -> Option<&dyn Method> {
    self
      .methods
      .iter()
      .find(|method| method.name == name)
      .map(|method| method as &dyn Method)
  }

  async fn send_msg(
    &self,
    writer: &mut dyn ResponseWriter,
    request: Request,
    store: &Store,
  ) -> Result<(), CallError> {
    if self.closed.load(Ordering::Acquire) {
      return Err(CallError::Closed);
    }

    let method = self
      .methods
      .iter()
      .find(|method| method.name == request.method)
      .ok_or_else(|| CallError::UnknownMethod {
        service: self.service.clone(),
        method: request.method.clone(),
      })?;

    let url = self.url(&method.endpoint.render(store)?)?;
    debug!(service = %self.service, method = %method.name, verb = %method.verb, url = %url, "sending http request");

    let mut builder = self.client.request(method.verb.clone(), url);
    for (key, value) in &request.headers {
      if SKIPPED_HEADERS.contains(&key.to_ascii_lowercase().as_str()) {
        continue;
      }
      builder = builder.header(key, value);
    }

    let has_body = !matches!(method.verb, reqwest::Method::GET | reqwest::Method::HEAD);
    if has_body && !request.body.is_empty() {
      let typed = request
        .headers
        .keys()
        .any(|key| key.eq_ignore_ascii_case(reqwest::header::CONTENT_TYPE.as_str()));
      if !typed {
        builder = builder.header(reqwest::header::CONTENT_TYPE, "application/json");
      }
      builder = builder.body(request.body.clone());
    }

    let exchange = async {
      match request.timeout {
        Some(timeout) => tokio::time::timeout(timeout, self.exchange(builder))
          .await
          .map_err(|_| CallError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
          })?,
        None => self.exchange(builder).await,
      }
    };

    let (status, headers, body) = tokio::select! {
      biased;
      _ = request.cancel.cancelled() => return Err(CallError::Cancelled),
      result = exchange => result?,
    };

    if !status.is_success() {
      return Err(CallError::Status {
        status: status.as_u16(),
        body: String::from_utf8_lossy(&body).into_owned(),
      });
    }

    writer.headers_mut().extend(headers);
    writer.write_header(status.as_u16());
    writer.write_all(&body)?;

    Ok(())
  }

  fn close(&self) -> Result<(), CallError> {
    if !self.closed.swap(true, Ordering::AcqRel) {
      debug!(service = %self.service, "closed http call");
    }
    Ok(())
  }
}
