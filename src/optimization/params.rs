//! The fixed, ordered set of tunable frecency parameters.
//!
//! The order here is the positional order of the remote model vector and of
//! the gradient reported upstream, so it must never be rearranged.

use serde::{Deserialize, Serialize};

const PREF_PREFIX: &str = "places.frecency.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrecencyParam {
    FirstBucketCutoff,
    SecondBucketCutoff,
    ThirdBucketCutoff,
    FourthBucketCutoff,
    FirstBucketWeight,
    SecondBucketWeight,
    ThirdBucketWeight,
    FourthBucketWeight,
    DefaultBucketWeight,
    EmbedVisitBonus,
    FramedLinkVisitBonus,
    LinkVisitBonus,
    TypedVisitBonus,
    BookmarkVisitBonus,
    DownloadVisitBonus,
    PermRedirectVisitBonus,
    TempRedirectVisitBonus,
    RedirectSourceVisitBonus,
    DefaultVisitBonus,
    UnvisitedBookmarkBonus,
    UnvisitedTypedBonus,
    ReloadVisitBonus,
}

impl FrecencyParam {
    pub const COUNT: usize = 22;

    pub const ALL: [FrecencyParam; Self::COUNT] = [
        FrecencyParam::FirstBucketCutoff,
        FrecencyParam::SecondBucketCutoff,
        FrecencyParam::ThirdBucketCutoff,
        FrecencyParam::FourthBucketCutoff,
        FrecencyParam::FirstBucketWeight,
        FrecencyParam::SecondBucketWeight,
        FrecencyParam::ThirdBucketWeight,
        FrecencyParam::FourthBucketWeight,
        FrecencyParam::DefaultBucketWeight,
        FrecencyParam::EmbedVisitBonus,
        FrecencyParam::FramedLinkVisitBonus,
        FrecencyParam::LinkVisitBonus,
        FrecencyParam::TypedVisitBonus,
        FrecencyParam::BookmarkVisitBonus,
        FrecencyParam::DownloadVisitBonus,
        FrecencyParam::PermRedirectVisitBonus,
        FrecencyParam::TempRedirectVisitBonus,
        FrecencyParam::RedirectSourceVisitBonus,
        FrecencyParam::DefaultVisitBonus,
        FrecencyParam::UnvisitedBookmarkBonus,
        FrecencyParam::UnvisitedTypedBonus,
        FrecencyParam::ReloadVisitBonus,
    ];

    /// Position of this parameter in the model vector.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn key(self) -> &'static str {
        match self {
            FrecencyParam::FirstBucketCutoff => "firstBucketCutoff",
            FrecencyParam::SecondBucketCutoff => "secondBucketCutoff",
            FrecencyParam::ThirdBucketCutoff => "thirdBucketCutoff",
            FrecencyParam::FourthBucketCutoff => "fourthBucketCutoff",
            FrecencyParam::FirstBucketWeight => "firstBucketWeight",
            FrecencyParam::SecondBucketWeight => "secondBucketWeight",
            FrecencyParam::ThirdBucketWeight => "thirdBucketWeight",
            FrecencyParam::FourthBucketWeight => "fourthBucketWeight",
            FrecencyParam::DefaultBucketWeight => "defaultBucketWeight",
            FrecencyParam::EmbedVisitBonus => "embedVisitBonus",
            FrecencyParam::FramedLinkVisitBonus => "framedLinkVisitBonus",
            FrecencyParam::LinkVisitBonus => "linkVisitBonus",
            FrecencyParam::TypedVisitBonus => "typedVisitBonus",
            FrecencyParam::BookmarkVisitBonus => "bookmarkVisitBonus",
            FrecencyParam::DownloadVisitBonus => "downloadVisitBonus",
            FrecencyParam::PermRedirectVisitBonus => "permRedirectVisitBonus",
            FrecencyParam::TempRedirectVisitBonus => "tempRedirectVisitBonus",
            FrecencyParam::RedirectSourceVisitBonus => "redirectSourceVisitBonus",
            FrecencyParam::DefaultVisitBonus => "defaultVisitBonus",
            FrecencyParam::UnvisitedBookmarkBonus => "unvisitedBookmarkBonus",
            FrecencyParam::UnvisitedTypedBonus => "unvisitedTypedBonus",
            FrecencyParam::ReloadVisitBonus => "reloadVisitBonus",
        }
    }

    /// Full preference name, e.g. `places.frecency.typedVisitBonus`.
    pub fn pref_name(self) -> String {
        format!("{}{}", PREF_PREFIX, self.key())
    }

    /// Stock Places value, used until a remote model has been applied.
    pub fn default_value(self) -> i64 {
        match self {
            FrecencyParam::FirstBucketCutoff => 4,
            FrecencyParam::SecondBucketCutoff => 14,
            FrecencyParam::ThirdBucketCutoff => 31,
            FrecencyParam::FourthBucketCutoff => 90,
            FrecencyParam::FirstBucketWeight => 100,
            FrecencyParam::SecondBucketWeight => 70,
            FrecencyParam::ThirdBucketWeight => 50,
            FrecencyParam::FourthBucketWeight => 30,
            FrecencyParam::DefaultBucketWeight => 10,
            FrecencyParam::EmbedVisitBonus => 0,
            FrecencyParam::FramedLinkVisitBonus => 0,
            FrecencyParam::LinkVisitBonus => 100,
            FrecencyParam::TypedVisitBonus => 2000,
            FrecencyParam::BookmarkVisitBonus => 75,
            FrecencyParam::DownloadVisitBonus => 0,
            FrecencyParam::PermRedirectVisitBonus => 0,
            FrecencyParam::TempRedirectVisitBonus => 0,
            FrecencyParam::RedirectSourceVisitBonus => 25,
            FrecencyParam::DefaultVisitBonus => 0,
            FrecencyParam::UnvisitedBookmarkBonus => 140,
            FrecencyParam::UnvisitedTypedBonus => 200,
            FrecencyParam::ReloadVisitBonus => 0,
        }
    }
}
