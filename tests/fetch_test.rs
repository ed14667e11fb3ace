mod common;

use common::{MockSession, Reply};
use http::{HeaderMap, Method, StatusCode, Version};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use unifetch::base::neterror::BoxError;
use unifetch::{
    fetch, AbortController, ContentDecoder, HttpProtocol, NetError, RedirectMode, Request,
};
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

#[tokio::test]
async fn test_get_redirect_reissues_get() {
    let session = MockSession::new()
        .route("http://a.test/start", Reply::redirect(302, "/end"))
        .route("http://a.test/end", Reply::ok("done"));

    let resp = fetch(&session, Request::new("http://a.test/start").unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.url().as_str(), "http://a.test/end");
    assert!(resp.redirected());

    let sent = session.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].method, Method::GET);
    assert_eq!(sent[1].uri, "/end");
    assert_eq!(&resp.bytes().await.unwrap()[..], b"done");
}

#[tokio::test]
async fn test_first_hop_is_not_redirected() {
    let session = MockSession::new().route("http://a.test/", Reply::ok("hi"));
    let resp = fetch(&session, Request::new("http://a.test/").unwrap())
        .await
        .unwrap();
    assert!(!resp.redirected());
    assert!(resp.ok());
    assert_eq!(resp.status_text(), "OK");
    assert_eq!(resp.version(), Version::HTTP_11);
    assert_eq!(session.released(), 1);
}

#[tokio::test]
async fn test_post_redirect_fails_with_method_error() {
    let session = MockSession::new()
        .route("http://a.test/form", Reply::redirect(302, "/thanks"))
        .route("http://a.test/thanks", Reply::ok("thanks"));

    let mut req = Request::new("http://a.test/form").unwrap();
    req.set_method(Method::POST);
    req.set_body("name=x");

    let err = fetch(&session, req).await.unwrap_err();
    match err {
        NetError::RedirectionMethod {
            location,
            method,
            chain,
        } => {
            assert_eq!(location, url("http://a.test/thanks"));
            assert_eq!(method, Method::POST);
            assert_eq!(chain, vec![url("http://a.test/form")]);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(session.sent().len(), 1);
    assert_eq!(&session.sent()[0].body[..], b"name=x");
}

#[tokio::test]
async fn test_cycle_detected_before_network() {
    let session = MockSession::new()
        .route("http://a.test/a", Reply::redirect(302, "/b"))
        .route("http://a.test/b", Reply::redirect(302, "/a"));

    let err = fetch(&session, Request::new("http://a.test/a").unwrap())
        .await
        .unwrap_err();
    match err {
        NetError::RedirectionLoop { chain } => assert_eq!(
            chain,
            vec![url("http://a.test/a"), url("http://a.test/b"), url("http://a.test/a")]
        ),
        other => panic!("unexpected {:?}", other),
    }
    // The revisit of /a never reached a connection.
    assert_eq!(session.acquired(), 2);
    assert_eq!(session.sent().len(), 2);
}

#[tokio::test]
async fn test_hop_limit() {
    let mut session = MockSession::new()
        .route("http://a.test/1", Reply::redirect(301, "/2"))
        .route("http://a.test/2", Reply::redirect(301, "/3"))
        .route("http://a.test/3", Reply::redirect(301, "/4"))
        .route("http://a.test/4", Reply::ok("far"));
    session.max_redirects = 2;

    let err = fetch(&session, Request::new("http://a.test/1").unwrap())
        .await
        .unwrap_err();
    match err {
        NetError::TooManyRedirects { chain } => assert_eq!(
            chain,
            vec![url("http://a.test/1"), url("http://a.test/2"), url("http://a.test/3")]
        ),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(session.sent().len(), 3);
}

#[tokio::test]
async fn test_error_and_manual_modes() {
    let session = MockSession::new()
        .route("http://a.test/old", Reply::redirect(308, "http://b.test/new"))
        .route("http://b.test/new", Reply::ok("new"));

    let mut req = Request::new("http://a.test/old").unwrap();
    req.set_redirect(RedirectMode::Error);
    let err = fetch(&session, req).await.unwrap_err();
    match err {
        NetError::Redirection { location, chain } => {
            assert_eq!(location.host_str(), Some("b.test"));
            assert_eq!(chain, vec![url("http://a.test/old")]);
        }
        other => panic!("unexpected {:?}", other),
    }

    let mut req = Request::new("http://a.test/old").unwrap();
    req.set_redirect(RedirectMode::Manual);
    let resp = fetch(&session, req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PERMANENT_REDIRECT);
    assert!(!resp.redirected());
    assert_eq!(resp.headers().get("location").unwrap(), "http://b.test/new");

    assert!(session.sent().iter().all(|s| s.url.host_str() == Some("a.test")));
}

#[tokio::test]
async fn test_redirect_without_location_reports_chain() {
    let session = MockSession::new()
        .route("http://a.test/1", Reply::redirect(302, "/2"))
        .route("http://a.test/2", Reply::redirect(302, "/3"))
        .route("http://a.test/3", Reply::status(302));
    let err = fetch(&session, Request::new("http://a.test/1").unwrap())
        .await
        .unwrap_err();
    match err {
        NetError::IllegalRedirect {
            url: from,
            location,
            chain,
        } => {
            assert_eq!(from, url("http://a.test/3"));
            assert!(location.is_none());
            assert_eq!(
                chain,
                vec![url("http://a.test/1"), url("http://a.test/2"), url("http://a.test/3")]
            );
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_cookie_round_trip() {
    let session = MockSession::new()
        .route(
            "http://a.test/login",
            Reply::ok("welcome")
                .header("set-cookie", "foo=bar")
                .header("set-cookie2", "legacy=1"),
        )
        .route("http://a.test/home", Reply::ok("home"));

    let resp = fetch(&session, Request::new("http://a.test/login").unwrap())
        .await
        .unwrap();
    assert!(resp.headers().get("set-cookie").is_none());
    assert!(resp.headers().get("set-cookie2").is_none());

    fetch(&session, Request::new("http://a.test/home").unwrap())
        .await
        .unwrap();
    let sent = session.sent();
    assert!(sent[0].headers.get("cookie").is_none());
    assert_eq!(sent[1].headers.get("cookie").unwrap(), "foo=bar");
}

#[tokio::test]
async fn test_cookie_set_on_redirect_hop_is_sent_to_next_hop() {
    let session = MockSession::new()
        .route(
            "http://a.test/sso",
            Reply::redirect(302, "/app").header("set-cookie", "sid=42; Path=/"),
        )
        .route("http://a.test/app", Reply::ok("app"));

    let mut req = Request::new("http://a.test/sso").unwrap();
    req.add_header("Cookie", "theme=dark").unwrap();
    fetch(&session, req).await.unwrap();

    let sent = session.sent();
    assert_eq!(sent[0].headers.get("cookie").unwrap(), "theme=dark");
    assert_eq!(sent[1].headers.get("cookie").unwrap(), "sid=42; theme=dark");
}

#[tokio::test]
async fn test_credentials_dropped_on_cross_origin_hop() {
    let session = MockSession::new()
        .route("http://a.test/", Reply::redirect(302, "http://b.test/"))
        .route("http://b.test/", Reply::ok("b"));

    let mut req = Request::new("http://a.test/").unwrap();
    req.add_header("Authorization", "Bearer secret").unwrap();
    req.add_header("Proxy-Authorization", "Basic xyz").unwrap();
    req.add_header("Cookie", "session=secret").unwrap();
    req.add_header("X-Request-Id", "7").unwrap();
    fetch(&session, req).await.unwrap();

    let sent = session.sent();
    assert_eq!(sent[0].headers.get("authorization").unwrap(), "Bearer secret");
    assert_eq!(sent[0].headers.get("proxy-authorization").unwrap(), "Basic xyz");
    assert_eq!(sent[0].headers.get("cookie").unwrap(), "session=secret");

    assert_eq!(sent[1].url.host_str(), Some("b.test"));
    for name in ["authorization", "proxy-authorization", "cookie", "cookie2"] {
        assert!(sent[1].headers.get(name).is_none(), "{} sent to b.test", name);
    }
    assert_eq!(sent[1].headers.get("x-request-id").unwrap(), "7");
}

#[tokio::test]
async fn test_credentials_kept_on_same_origin_hop() {
    let session = MockSession::new()
        .route("http://a.test/", Reply::redirect(302, "/inner"))
        .route("http://a.test/inner", Reply::ok("inner"));

    let mut req = Request::new("http://a.test/").unwrap();
    req.add_header("Authorization", "Bearer secret").unwrap();
    req.add_header("Cookie", "session=secret").unwrap();
    fetch(&session, req).await.unwrap();

    let sent = session.sent();
    assert_eq!(sent[1].headers.get("authorization").unwrap(), "Bearer secret");
    assert_eq!(sent[1].headers.get("cookie").unwrap(), "session=secret");
}

#[tokio::test]
async fn test_accept_encoding_and_decoders() {
    let mut session = MockSession::new().route("http://a.test/", Reply::ok("x"));
    session.decoders = vec![ContentDecoder::new("br")];

    let resp = fetch(&session, Request::new("http://a.test/").unwrap())
        .await
        .unwrap();
    assert_eq!(resp.content_decoders(), &[ContentDecoder::new("br")]);

    let sent = session.sent();
    assert_eq!(
        sent[0].headers.get("accept-encoding").unwrap(),
        "br;q=1.0, gzip;q=0.8, deflate;q=0.5"
    );
    assert_eq!(sent[0].headers.get("user-agent").unwrap(), "unifetch-test/1.0");
    assert_eq!(sent[0].headers.get("host").unwrap(), "a.test");
}

#[tokio::test]
async fn test_h2_request_shape() {
    let mut session = MockSession::new().route("http://a.test/p?q=1", Reply::ok("h2"));
    session.protocol = HttpProtocol::Http2;

    let mut req = Request::new("http://a.test/p?q=1").unwrap();
    req.add_header("Host", "cdn.test").unwrap();
    let resp = fetch(&session, req).await.unwrap();
    assert_eq!(resp.version(), Version::HTTP_2);

    let sent = session.sent();
    assert_eq!(sent[0].version, Version::HTTP_2);
    assert_eq!(sent[0].uri, "http://cdn.test/p?q=1");
    assert!(sent[0].headers.get("host").is_none());
}

#[tokio::test]
async fn test_integrity_carried_to_response() {
    let session = MockSession::new().route("http://a.test/app.js", Reply::ok("js"));
    let mut req = Request::new("http://a.test/app.js").unwrap();
    req.set_integrity("sha256-abc");
    let resp = fetch(&session, req).await.unwrap();
    assert_eq!(resp.integrity(), Some("sha256-abc"));
}

#[tokio::test]
async fn test_interim_statuses() {
    let session = MockSession::new()
        .route("http://a.test/continue", Reply::status(100))
        .route("http://a.test/upgrade", Reply::status(101).header("upgrade", "websocket"))
        .route("http://a.test/hints", Reply::status(103));

    let err = fetch(&session, Request::new("http://a.test/continue").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::InformationalProtocol));

    let err = fetch(&session, Request::new("http://a.test/upgrade").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::UpgradeUnsupported));

    let resp = fetch(&session, Request::new("http://a.test/hints").unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 103);
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_trailers_delivered_after_body() {
    let mut trailers = HeaderMap::new();
    trailers.insert("x-checksum", "abc".parse().unwrap());
    let session = MockSession::new().route(
        "http://a.test/stream",
        Reply::ok("payload").with_trailers(trailers),
    );

    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    let mut req = Request::new("http://a.test/stream").unwrap();
    req.set_trailer_callback(Arc::new(move |t: &HeaderMap| -> Result<(), BoxError> {
        *sink.lock().unwrap() = t.get("x-checksum").cloned();
        Ok(())
    }));

    let resp = fetch(&session, req).await.unwrap();
    assert!(seen.lock().unwrap().is_none());
    assert_eq!(&resp.bytes().await.unwrap()[..], b"payload");
    assert_eq!(seen.lock().unwrap().as_ref().unwrap(), "abc");
}

#[tokio::test]
async fn test_trailer_failure_does_not_fail_body() {
    let session = MockSession::new().route(
        "http://a.test/stream",
        Reply::ok("payload").with_trailers(HeaderMap::new()),
    );
    let mut req = Request::new("http://a.test/stream").unwrap();
    req.set_trailer_callback(Arc::new(|_: &HeaderMap| -> Result<(), BoxError> {
        Err("consumer went away".into())
    }));

    let resp = fetch(&session, req).await.unwrap();
    assert_eq!(&resp.bytes().await.unwrap()[..], b"payload");
}

#[tokio::test(start_paused = true)]
async fn test_deadline_spans_redirect_chain() {
    let hop = Duration::from_millis(60);
    let session = MockSession::new()
        .route("http://a.test/1", Reply::redirect(302, "/2").after(hop))
        .route("http://a.test/2", Reply::redirect(302, "/3").after(hop))
        .route("http://a.test/3", Reply::ok("late").after(hop));

    let mut req = Request::new("http://a.test/1").unwrap();
    req.set_timeout(Duration::from_millis(100));

    let err = fetch(&session, req).await.unwrap_err();
    assert!(matches!(err, NetError::TimedOut));
    // Each hop alone fits in the budget; the second one crosses it.
    assert_eq!(session.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_chain_within_deadline_succeeds() {
    let hop = Duration::from_millis(30);
    let session = MockSession::new()
        .route("http://a.test/1", Reply::redirect(302, "/2").after(hop))
        .route("http://a.test/2", Reply::ok("on time").after(hop));

    let mut req = Request::new("http://a.test/1").unwrap();
    req.set_timeout(Duration::from_millis(100));
    let resp = fetch(&session, req).await.unwrap();
    assert_eq!(&resp.bytes().await.unwrap()[..], b"on time");
}

#[tokio::test(start_paused = true)]
async fn test_slow_transport_times_out() {
    let session = MockSession::new()
        .route("http://a.test/", Reply::ok("never").after(Duration::from_secs(5)));
    let mut req = Request::new("http://a.test/").unwrap();
    req.set_timeout(Duration::from_secs(1));

    let err = fetch(&session, req).await.unwrap_err();
    assert!(matches!(err, NetError::TimedOut));
    assert_eq!(session.released(), 0);
}

#[tokio::test]
async fn test_already_aborted_never_connects() {
    let session = MockSession::new().route("http://a.test/", Reply::ok("x"));
    let controller = AbortController::new();
    controller.abort();

    let mut req = Request::new("http://a.test/").unwrap();
    req.set_signal(controller.signal());
    let err = fetch(&session, req).await.unwrap_err();
    assert!(matches!(err, NetError::Aborted));
    assert_eq!(session.acquired(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abort_mid_flight() {
    let session = MockSession::new()
        .route("http://a.test/", Reply::ok("slow").after(Duration::from_secs(10)));
    let controller = AbortController::new();
    let signal = controller.signal();

    let mut req = Request::new("http://a.test/").unwrap();
    req.set_signal(signal.clone());
    req.set_timeout(Duration::from_secs(30));

    let aborter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.abort();
    });

    let err = fetch(&session, req).await.unwrap_err();
    assert!(matches!(err, NetError::Aborted));
    assert_eq!(signal.listener_count(), 0);
    aborter.await.unwrap();
}
