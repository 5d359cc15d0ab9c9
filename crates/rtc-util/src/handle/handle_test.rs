use super::*;

#[tokio::test]
async fn test_handle_lifecycle() -> Result<()> {
    let h: Handle<u32> = Handle::new();
    assert!(!h.initialized().await);

    h.init(7).await?;
    assert!(h.initialized().await);
    assert!(h.active().await);

    let taken = h.close().await?;
    assert_eq!(taken, Some(7));
    assert!(h.closed().await);
    assert!(!h.active().await);

    Ok(())
}

#[tokio::test]
async fn test_close_is_idempotent() -> Result<()> {
    let h: Handle<u32> = Handle::new();
    h.init(1).await?;

    assert_eq!(h.close().await?, Some(1));
    assert_eq!(h.close().await?, None);
    assert!(h.closed().await);

    Ok(())
}

#[tokio::test]
async fn test_context_deleted_blocks_access() -> Result<()> {
    let ctx: Context<u32> = Context::new();
    ctx.set(42).await;

    assert_eq!(ctx.with(|v| *v).await?, 42);

    ctx.mark_deleted().await;
    assert!(ctx.with(|v| *v).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_async_wake_drains_submitted_work() {
    let (wake, mut drain) = AsyncWake::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    wake.submit(move || {
        let _ = tx.send(1);
    })
    .unwrap();

    let n = drain.drain().await;
    assert_eq!(n, 1);
    assert_eq!(rx.recv().await, Some(1));
}
