#![doc = include_str!("../README.md")]

use crate::assembler::StreamBundle;
use crate::error::{Error, Result};
use crate::fetch::PageFetcher;
use crate::reference::VideoId;
use std::fmt;

pub mod assembler;
pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod player;
pub mod reference;
pub mod resolver;

pub use assembler::StreamOption;
pub use config::Config;
pub use fetch::HttpFetcher;
pub use resolver::ResolvedStream;

/// The steps of one resolution call. A failure can end the call at any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResolutionStage {
    Start,
    Identified,
    Fetched,
    ManifestParsed,
    FormatsResolved,
    BundleReady,
}

impl ResolutionStage {
    fn advance(&mut self, next: ResolutionStage) {
        log::debug!("{} -> {}", self, next);
        *self = next;
    }
}

impl fmt::Display for ResolutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionStage::Start => "START",
            ResolutionStage::Identified => "IDENTIFIED",
            ResolutionStage::Fetched => "FETCHED",
            ResolutionStage::ManifestParsed => "MANIFEST_PARSED",
            ResolutionStage::FormatsResolved => "FORMATS_RESOLVED",
            ResolutionStage::BundleReady => "BUNDLE_READY",
        };
        f.write_str(name)
    }
}

/// Resolves video references into stream bundles, one reference per call.
///
/// The resolver holds no state besides its fetcher, so independent calls may run concurrently.
#[derive(Clone, Debug)]
pub struct Resolver<F> {
    fetcher: F,
}

impl<F: PageFetcher> Resolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolves a watch URL, short link or bare identifier into its download options.
    ///
    /// The page fetch is the only blocking step and carries no timeout of its own; wrap the call
    /// to impose one.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidReference`], [`Error::FetchFailed`], [`Error::ManifestNotFound`] or
    /// [`Error::NoResolvableFormats`], depending on the stage that failed.
    pub async fn resolve(&self, raw_input: &str) -> Result<StreamBundle> {
        let mut stage = ResolutionStage::Start;
        let result = self.run(raw_input, &mut stage).await;
        if let Err(e) = &result {
            log::debug!("{} -> FAILED({})", stage, e);
        }
        result
    }

    async fn run(&self, raw_input: &str, stage: &mut ResolutionStage) -> Result<StreamBundle> {
        let id = reference::extract(raw_input)?;
        stage.advance(ResolutionStage::Identified);

        let markup = self.fetcher.fetch_page(&id).await?;
        stage.advance(ResolutionStage::Fetched);

        resolve_page(&id, &markup, self.fetcher.host(), stage)
    }
}

/// Runs the offline part of the pipeline on markup that was already fetched.
///
/// # Errors
///
/// [`Error::ManifestNotFound`] or [`Error::NoResolvableFormats`].
pub fn resolve_markup(id: &VideoId, markup: &str, host: &str) -> Result<StreamBundle> {
    let mut stage = ResolutionStage::Fetched;
    resolve_page(id, markup, host, &mut stage)
}

fn resolve_page(
    id: &VideoId,
    markup: &str,
    host: &str,
    stage: &mut ResolutionStage,
) -> Result<StreamBundle> {
    let manifest = manifest::extract(markup)?;
    stage.advance(ResolutionStage::ManifestParsed);

    let streams = resolver::resolve(&manifest);
    if streams.is_empty() {
        return Err(Error::NoResolvableFormats(id.to_string()));
    }
    stage.advance(ResolutionStage::FormatsResolved);

    let title = manifest.title().unwrap_or(id.as_str());
    let mut bundle = assembler::assemble(title, &streams);
    bundle.player_script = player::find_script_url(markup, host);
    stage.advance(ResolutionStage::BundleReady);

    log::info!(
        "Resolved {} options from {} formats for \"{}\"",
        bundle.options.len(),
        streams.len(),
        bundle.title
    );
    Ok(bundle)
}
