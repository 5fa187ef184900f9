use scope_intercom::channel::memory::MemoryChannel;
use scope_intercom::channel::MessageChannel;
use scope_intercom::{protocol, AppError};

#[tokio::test]
async fn exact_token_is_accepted() {
    let (analyzer, controller) = MemoryChannel::pair();

    controller
        .send_line(protocol::START_INIT_PROCESS)
        .await
        .expect("send");

    protocol::await_token(&analyzer, protocol::START_INIT_PROCESS)
        .await
        .expect("exact token passes the gate");
}

#[tokio::test]
async fn case_mismatched_token_is_a_protocol_violation() {
    let (analyzer, controller) = MemoryChannel::pair();

    controller
        .send_line("startinitprocess")
        .await
        .expect("send");

    let err = protocol::await_token(&analyzer, protocol::START_INIT_PROCESS)
        .await
        .expect_err("case mismatch must not pass");
    assert!(matches!(err, AppError::Protocol(_)), "got: {err}");
}

#[tokio::test]
async fn unexpected_token_is_a_protocol_violation() {
    let (analyzer, controller) = MemoryChannel::pair();

    controller.send_line("wrongToken").await.expect("send");

    let err = protocol::await_token(&analyzer, protocol::START_STREAM_ANALYSIS)
        .await
        .expect_err("wrong token must not pass");
    assert!(matches!(err, AppError::Protocol(_)), "got: {err}");
}

#[tokio::test]
async fn session_id_round_trips() {
    let (analyzer, controller) = MemoryChannel::pair();

    controller.send_line("run42").await.expect("send");

    let id = protocol::recv_session_id(&analyzer).await.expect("valid id");
    assert_eq!(id, "run42");
}

#[tokio::test]
async fn traversal_session_id_is_rejected() {
    let (analyzer, controller) = MemoryChannel::pair();

    controller.send_line("../escape").await.expect("send");

    let err = protocol::recv_session_id(&analyzer)
        .await
        .expect_err("traversal id must be rejected");
    assert!(matches!(err, AppError::Protocol(_)), "got: {err}");
}

#[tokio::test]
async fn ready_signal_carries_the_fixed_token() {
    let (analyzer, controller) = MemoryChannel::pair();

    protocol::send_ready(&analyzer).await.expect("send ready");

    let received = controller.recv_line().await.expect("recv");
    assert_eq!(received, protocol::START_STREAM_ACQUISITION);
}
