use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Social platforms recognized by the pipeline. Anything unrecognized is
/// coerced to `Other` rather than rejected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Facebook,
    Twitter,
    Tiktok,
    Youtube,
    Linkedin,
    Other,
}

static PLATFORM_ALIASES: Lazy<HashMap<&'static str, Platform>> = Lazy::new(|| {
    HashMap::from([
        ("instagram", Platform::Instagram),
        ("ig", Platform::Instagram),
        ("insta", Platform::Instagram),
        ("facebook", Platform::Facebook),
        ("fb", Platform::Facebook),
        ("twitter", Platform::Twitter),
        ("x", Platform::Twitter),
        ("tiktok", Platform::Tiktok),
        ("youtube", Platform::Youtube),
        ("yt", Platform::Youtube),
        ("linkedin", Platform::Linkedin),
    ])
});

impl Platform {
    /// Case/whitespace-normalizes a raw platform value and coerces it to the
    /// closest enumeration member, falling back to `Other`.
    pub fn parse(raw: &str) -> Platform {
        let normalized = raw.trim().to_lowercase();
        PLATFORM_ALIASES
            .get(normalized.as_str())
            .copied()
            .unwrap_or(Platform::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
            Platform::Linkedin => "linkedin",
            Platform::Other => "other",
        }
    }
}

/// A normalized social handle: lower-cased, leading `@`s stripped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SocialHandle {
    pub platform: Platform,
    pub handle: String,
}

/// Membership in an advocacy program. Entries with an unresolved or
/// placeholder name never make it into the canonical record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgramMembership {
    pub program_id: String,
    pub program_name: String,
}

/// A social post completed as part of a program task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub post_id: String,
    pub platform: Platform,
    pub url: Option<String>,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub reach: u64,
    /// likes + comments + shares (reach excluded)
    pub engagement: u64,
}

impl Post {
    pub fn engagement_of(likes: u64, comments: u64, shares: u64) -> u64 {
        likes + comments + shares
    }
}

/// Sales credited to a program. Only recorded for a non-blank program id and
/// an amount strictly greater than zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesAttribution {
    pub program_id: String,
    pub amount: f64,
}

/// Canonical advocacy-program participant record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub social_handles: Vec<SocialHandle>,
    pub programs: Vec<ProgramMembership>,
    pub posts: Vec<Post>,
    pub sales_attributions: Vec<SalesAttribution>,
    pub join_date: Option<DateTime<Utc>>,
    /// Sum of all posts' engagement. Always recomputed from `posts`, never
    /// trusted from input.
    pub total_engagement: u64,
    /// Sum of all attribution amounts. Same invariant as `total_engagement`.
    pub total_sales: f64,
}

impl User {
    pub fn new(id: String) -> Self {
        Self {
            id,
            name: None,
            email: None,
            social_handles: Vec::new(),
            programs: Vec::new(),
            posts: Vec::new(),
            sales_attributions: Vec::new(),
            join_date: None,
            total_engagement: 0,
            total_sales: 0.0,
        }
    }

    /// Rederives both totals from the post and attribution collections.
    pub fn recompute_totals(&mut self) {
        self.total_engagement = self.posts.iter().map(|p| p.engagement).sum();
        self.total_sales = self.sales_attributions.iter().map(|s| s.amount).sum();
    }
}

/// Derived per-program aggregate. Rebuilt wholesale after each load cycle,
/// never authored directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgramStats {
    pub program_id: String,
    pub program_name: String,
    pub user_count: u64,
    pub total_engagement: u64,
    pub total_sales: f64,
}
