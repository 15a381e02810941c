use sopa_core::binding::{ServiceBinding, WireOperation};
use sopa_core::envelope::{self, Fault};
use sopa_core::proxy::{InvokeError, Online, ServiceProxy};
use sopa_core::transport::{HttpTransport, Transport, TransportError, TransportRequest};
use sopa_core::value::Value;
use sopa_core::wire::WireValue;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DESCRIPTION: &str = r#"{
    "namespace": "urn:echo",
    "operations": [{ "name": "echo", "input": "string", "output": "string" }]
}"#;

fn echo_proxy(transport: HttpTransport) -> ServiceProxy<Online<HttpTransport>> {
    ServiceProxy::offline(ServiceBinding::from_json(DESCRIPTION).unwrap()).connect(transport)
}

fn echo_url(server: &MockServer) -> String {
    format!("{}/echo", server.uri())
}

#[tokio::test]
async fn test_envelope_is_posted_with_soap_action() {
    let mock_server = MockServer::start().await;
    let response = envelope::build_response(
        &WireOperation::new("urn:echo", "echo"),
        &WireValue::scalar("hello"),
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/echo"))
        .and(header("content-type", "text/xml; charset=utf-8"))
        .and(header("SOAPAction", "\"urn:echo/echo\""))
        .and(body_string_contains(
            r#"<ns1:echo xmlns:ns1="urn:echo">hello</ns1:echo>"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(response))
        .expect(1)
        .mount(&mock_server)
        .await;

    let proxy = echo_proxy(HttpTransport::new(&echo_url(&mock_server)).unwrap());

    let echoed = proxy
        .invoke("echo", vec![Value::from("hello")], vec![])
        .await
        .unwrap();
    assert_eq!(echoed, Value::from("hello"));
}

#[tokio::test]
async fn test_http_500_body_is_parsed_as_fault() {
    let mock_server = MockServer::start().await;
    let response = envelope::build_fault(&Fault::new("Server.Error", "bad input")).unwrap();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_bytes(response))
        .mount(&mock_server)
        .await;

    let proxy = echo_proxy(HttpTransport::new(&echo_url(&mock_server)).unwrap());

    let err = proxy
        .invoke("echo", vec![Value::from("hello")], vec![])
        .await
        .unwrap_err();

    let fault = err.fault().expect("Expected a remote fault");
    assert_eq!(fault.code, "Server.Error");
    assert_eq!(fault.reason, "bad input");
}

#[tokio::test]
async fn test_other_statuses_are_transport_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nothing here"))
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new(&echo_url(&mock_server)).unwrap();

    let err = transport
        .send(TransportRequest {
            operation: "echo",
            action: "urn:echo/echo",
            body: b"<x/>",
        })
        .await
        .unwrap_err();

    match err {
        TransportError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "nothing here");
        }
        other => panic!("Expected a status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_surfaces_as_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let proxy = echo_proxy(
        HttpTransport::new(&echo_url(&mock_server))
            .unwrap()
            .timeout(Duration::from_millis(100)),
    );

    let err = proxy
        .invoke("echo", vec![Value::from("hello")], vec![])
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        InvokeError::Transport(TransportError::Timeout(timeout)) if timeout == Duration::from_millis(100)
    ));
}
