//! HLS playlist URI rewriting.
//!
//! A full parse-serialize round-trip (m3u8-rs style) is not an option here:
//! the parser drops tags it does not model, and the proxy must return every
//! non-URI byte of the upstream playlist unchanged. Instead each line is
//! classified by its prefix or extension and only the URI token is replaced:
//!
//! 1. **Extract** the reference (bare line, or quoted `URI="…"` attribute)
//! 2. **Resolve** it to an absolute URL against the manifest's base
//! 3. **Rewrite** it into a same-origin proxy URL so the player routes every
//!    follow-up request back through this service
//!
//! Everything in this module is pure — no request/response objects, no I/O —
//! so the rewriting rules are testable without network mocking.

use tracing::debug;
use url::Url;

/// Extensions treated as opaque media payloads (transport stream, fMP4,
/// audio, subtitles). Matching lines route to the segment endpoint.
const SEGMENT_EXTENSIONS: &[&str] = &[".ts", ".m4s", ".mp4", ".aac", ".mp3", ".vtt"];

/// Per-manifest context for the rewrite pass.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    /// Absolute URL the manifest was fetched from. Relative references
    /// resolve against its directory.
    pub manifest_url: &'a str,
    /// Public base URL of this proxy, embedded in every rewritten line.
    pub public_base: &'a str,
}

/// Classification of a single playlist line.
///
/// Exactly one variant applies to any line; dispatch in [`rewrite_line`]
/// follows directly from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    /// Empty line, preserved verbatim.
    Blank,
    /// `#EXT-X-KEY` or `#EXT-X-MAP`: the quoted `URI` attribute points at
    /// opaque bytes (key material, init segment), never at a playlist.
    DirectiveWithUri,
    /// Any other `#` line. Carries no URI to rewrite.
    OtherDirective,
    /// Non-directive line referencing a nested playlist.
    NestedManifest,
    /// Non-directive line with a recognized media extension.
    MediaSegment,
    /// Anything else non-empty. Proxied as a segment rather than leaking a
    /// direct upstream URL or breaking playback.
    Fallback,
}

fn classify(line: &str) -> LineKind {
    if line.is_empty() {
        return LineKind::Blank;
    }
    if line.starts_with("#EXT-X-KEY") || line.starts_with("#EXT-X-MAP") {
        return LineKind::DirectiveWithUri;
    }
    if line.starts_with('#') {
        return LineKind::OtherDirective;
    }
    if line.contains(".m3u8") {
        return LineKind::NestedManifest;
    }
    // Extension check ignores any query string on the reference.
    let path = line.split(['?', '#']).next().unwrap_or(line);
    let path = path.to_ascii_lowercase();
    if SEGMENT_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return LineKind::MediaSegment;
    }
    LineKind::Fallback
}

/// The manifest's base: its URL up to and including the final `/`.
///
/// `https://host/live/chunklist.m3u8` → `https://host/live/`. A URL without
/// a path slash is returned unchanged (resolution against it will fail and
/// the affected lines pass through unrewritten).
pub fn manifest_base(manifest_url: &str) -> &str {
    match manifest_url.rfind('/') {
        Some(idx) => &manifest_url[..=idx],
        None => manifest_url,
    }
}

/// Resolve a playlist reference to an absolute URL.
///
/// References that already carry a scheme are used verbatim; everything else
/// resolves against `base` with standard relative-URL semantics. `None`
/// means the reference cannot be turned into a URL at all.
pub fn resolve_reference(base: &str, reference: &str) -> Option<Url> {
    match Url::parse(reference) {
        Ok(url) => Some(url),
        Err(_) => Url::parse(base).and_then(|b| b.join(reference)).ok(),
    }
}

/// Build a `/proxy-manifest` URL pointing back at this service.
fn manifest_proxy_url(public_base: &str, target: &Url) -> Option<String> {
    let mut url = Url::parse(public_base).ok()?;
    url.set_path("/proxy-manifest");
    url.set_query(None);
    url.query_pairs_mut().append_pair("url", target.as_str());
    Some(url.into())
}

/// Build a `/proxy-segment` URL pointing back at this service.
///
/// `file` carries the pre-resolved absolute target; `base` carries the
/// manifest's own base so the fetcher can re-resolve if the origin
/// redirected.
fn segment_proxy_url(ctx: &RewriteContext, target: &Url) -> Option<String> {
    let mut url = Url::parse(ctx.public_base).ok()?;
    url.set_path("/proxy-segment");
    url.set_query(None);
    url.query_pairs_mut()
        .append_pair("base", manifest_base(ctx.manifest_url))
        .append_pair("file", target.as_str());
    Some(url.into())
}

/// Rewrite the quoted `URI="…"` attribute of a key/map directive.
///
/// Key material and init segments are opaque bytes, so the attribute always
/// routes to the segment endpoint. A directive without the attribute, or one
/// whose value cannot be resolved, is returned unchanged.
fn rewrite_directive_uri(line: &str, ctx: &RewriteContext) -> String {
    let Some(attr) = line.find("URI=\"") else {
        return line.to_string();
    };
    let value_start = attr + "URI=\"".len();
    let Some(value_len) = line[value_start..].find('"') else {
        return line.to_string();
    };
    let reference = &line[value_start..value_start + value_len];

    let base = manifest_base(ctx.manifest_url);
    let Some(proxied) =
        resolve_reference(base, reference).and_then(|target| segment_proxy_url(ctx, &target))
    else {
        debug!("leaving unresolvable directive URI untouched: {reference}");
        return line.to_string();
    };

    format!(
        "{}{}{}",
        &line[..value_start],
        proxied,
        &line[value_start + value_len..]
    )
}

/// Rewrite a single playlist line. Pure; never fails.
///
/// Lines whose reference cannot be resolved (or whose proxy URL cannot be
/// built) come back unchanged — a broken line is the player's problem to
/// skip, a half-rewritten manifest is not.
pub fn rewrite_line(line: &str, ctx: &RewriteContext) -> String {
    let base = manifest_base(ctx.manifest_url);
    match classify(line) {
        LineKind::Blank | LineKind::OtherDirective => line.to_string(),
        LineKind::DirectiveWithUri => rewrite_directive_uri(line, ctx),
        LineKind::NestedManifest => resolve_reference(base, line)
            .and_then(|target| manifest_proxy_url(ctx.public_base, &target))
            .unwrap_or_else(|| line.to_string()),
        LineKind::MediaSegment | LineKind::Fallback => resolve_reference(base, line)
            .and_then(|target| segment_proxy_url(ctx, &target))
            .unwrap_or_else(|| line.to_string()),
    }
}

/// Rewrite a whole playlist, preserving line order, blank lines, and line
/// endings (LF and CRLF) exactly.
pub fn rewrite_manifest(content: &str, ctx: &RewriteContext) -> String {
    let mut out = String::with_capacity(content.len() * 2);
    for (idx, raw) in content.split('\n').enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let (line, had_cr) = match raw.strip_suffix('\r') {
            Some(stripped) => (stripped, true),
            None => (raw, false),
        };
        out.push_str(&rewrite_line(line, ctx));
        if had_cr {
            out.push('\r');
        }
    }
    out
}
