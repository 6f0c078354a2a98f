mod common;

use std::sync::atomic::Ordering;

use codereel::{BufferHost, BufferUri, EditorStatus, ReelError};
use common::Fixture;
use reelstore::{asset_keys, KeyValueStore, StoreError};

#[tokio::test]
async fn language_switch_fetches_once_and_retags_buffers() -> anyhow::Result<()> {
    let f = Fixture::new();
    f.session.setup().await?;
    let id = f.session.timeline().order()[0].clone();

    let grammar = f.session.set_language("rust").await?;
    assert_eq!(grammar["scopeName"], "source.rust");
    assert_eq!(f.session.settings().language(), "rust");
    assert_eq!(f.session.status().current(), EditorStatus::Idle);

    let handle = f
        .buffers
        .get_buffer(&BufferUri::for_id(id.as_str()))
        .await
        .unwrap();
    assert_eq!(f.buffers.read_language(&handle).await?, "rust");

    // New slides follow the re-tagged last slide
    let next = f.session.timeline().add().await.unwrap();
    let handle = f
        .buffers
        .get_buffer(&BufferUri::for_id(next.as_str()))
        .await
        .unwrap();
    assert_eq!(f.buffers.read_language(&handle).await?, "rust");

    f.session.set_language("typescript").await?;
    f.session.set_language("rust").await?;
    assert_eq!(f.source.grammar_calls.load(Ordering::SeqCst), 2);
    assert!(f.assets.get(&asset_keys::grammar("rust")).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn failed_grammar_fetch_changes_nothing() -> anyhow::Result<()> {
    let f = Fixture::new();
    f.session.setup().await?;
    f.source.set_offline(true);

    let err = f.session.set_language("python").await.unwrap_err();
    assert!(matches!(err, ReelError::Store(StoreError::Producer { .. })));
    assert_eq!(f.session.settings().language(), "typescript");
    assert_eq!(f.session.status().current(), EditorStatus::Error);
    assert!(f.assets.get(&asset_keys::grammar("python")).await?.is_none());

    // Back online, the next attempt fetches again
    f.source.set_offline(false);
    f.session.set_language("python").await?;
    assert_eq!(f.source.grammar_calls.load(Ordering::SeqCst), 2);
    assert_eq!(f.session.settings().language(), "python");
    Ok(())
}

#[tokio::test]
async fn theme_switch_is_cached_and_persisted() -> anyhow::Result<()> {
    let f = Fixture::new();
    f.session.setup().await?;

    let theme = f.session.set_theme("nord").await?;
    assert_eq!(theme["name"], "nord");
    f.session.set_theme("nord").await?;
    assert_eq!(f.source.theme_calls.load(Ordering::SeqCst), 1);

    f.session.save().await?;
    let g = f.reopen();
    g.session.setup().await?;
    assert_eq!(g.session.settings().theme(), "nord");
    Ok(())
}

#[tokio::test]
async fn playback_interval_follows_settings() {
    let f = Fixture::new();
    f.session
        .settings()
        .set_slide_interval(std::time::Duration::from_millis(750));
    assert_eq!(
        f.session.playback_options().interval,
        std::time::Duration::from_millis(750)
    );
    assert_eq!(f.session.playback_options().max_lines, 100);
}
