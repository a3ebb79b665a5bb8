//! Markup extraction for lostfilm pages.
//!
//! Turns raw HTML into the field values the listing and download adapters
//! work with. Nothing here interprets those values.
use crate::download_info::{DownloadCandidate, DownloadPage};
use crate::listing::{ListingPage, SeasonBlock};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

/// Meta tag the site serves instead of a 404 for hidden or missing pages.
pub(super) const REFRESH_TO_ROOT: &str = r#"<meta http-equiv="refresh" content="0; url=/">"#;

static TITLE_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.title-block").expect("valid selector"));
static TITLE_EN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2.title-en").expect("valid selector"));
static TITLE_RU: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1.title-ru").expect("valid selector"));
static ONCLICK_DIV: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[onclick]").expect("valid selector"));
static SEASON_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.series-block div.serie-block").expect("valid selector"));
static SEASON_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2").expect("valid selector"));
static EPISODE_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.movie-parts-list tr").expect("valid selector"));
static EPISODE_ACTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.zeta div").expect("valid selector"));
static DOWNLOAD_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.inner-box--item").expect("valid selector"));
static DOWNLOAD_LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.inner-box--label").expect("valid selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static META: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[content]").expect("valid selector"));

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub(super) fn is_refresh_to_root(html: &str) -> bool {
    html.contains(REFRESH_TO_ROOT)
}

/// Extracts the fields of a seasons page.
///
/// Returns a description of what is missing when the title block cannot be
/// found.
pub(super) fn listing_page(html: &str) -> Result<ListingPage, String> {
    let document = Html::parse_document(html);

    let title_block = document
        .select(&TITLE_BLOCK)
        .next()
        .ok_or_else(|| "no title block".to_string())?;

    let original_name = title_block
        .select(&TITLE_EN)
        .next()
        .map(text_of)
        .ok_or_else(|| "no English title".to_string())?;
    let localized_name = title_block.select(&TITLE_RU).next().map(text_of);
    let follow_action = title_block
        .select(&ONCLICK_DIV)
        .filter_map(|div| div.value().attr("onclick"))
        .find(|onclick| onclick.trim_start().starts_with("FollowSerial"))
        .map(str::to_string)
        .ok_or_else(|| "no follow button".to_string())?;

    let season_blocks = document
        .select(&SEASON_BLOCK)
        .map(|block| SeasonBlock {
            title: block.select(&SEASON_TITLE).next().map(text_of).unwrap_or_default(),
            episode_actions: block
                .select(&EPISODE_ROW)
                // Header and trailer rows carry a class, episode rows do not
                .filter(|row| row.value().attr("class").is_none())
                .map(|row| {
                    row.select(&EPISODE_ACTION)
                        .next()
                        .and_then(|div| div.value().attr("onclick"))
                        .unwrap_or_default()
                        .to_string()
                })
                .collect(),
        })
        .collect();

    Ok(ListingPage {
        original_name,
        localized_name,
        follow_action,
        season_blocks,
    })
}

/// Target of the first meta refresh on the page, resolved against `base`.
pub(super) fn meta_refresh_target(html: &str, base: &Url) -> Option<Url> {
    let document = Html::parse_document(html);
    let content = document
        .select(&META)
        .filter_map(|meta| meta.value().attr("content"))
        .find(|content| content.to_lowercase().contains("url="))?;

    let (_, target) = content.split_once(';')?;
    let (key, target) = target.trim().split_once('=')?;
    let target = target.trim();
    if !key.trim().eq_ignore_ascii_case("url") || target.is_empty() || target == "/" {
        return None;
    }
    base.join(target).ok()
}

/// Extracts the download candidates of a download page.
///
/// When the page lists nothing, the first link that does not point at the
/// site root becomes the follow link.
pub(super) fn download_page(html: &str, base: &Url) -> DownloadPage {
    let document = Html::parse_document(html);

    let candidates: Vec<DownloadCandidate> = document
        .select(&DOWNLOAD_ITEM)
        .filter_map(|item| {
            let label = item.select(&DOWNLOAD_LABEL).next().map(text_of)?;
            let url = item.select(&LINK).next()?.value().attr("href")?;
            Some(DownloadCandidate {
                label,
                url: url.to_string(),
            })
        })
        .collect();

    let follow_link = if candidates.is_empty() {
        document
            .select(&LINK)
            .filter_map(|link| link.value().attr("href"))
            .find(|href| *href != "/")
            .and_then(|href| base.join(href).ok())
            .map(String::from)
    } else {
        None
    };

    DownloadPage {
        candidates,
        follow_link,
    }
}
