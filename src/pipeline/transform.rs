use crate::domain::{Platform, Post, ProgramMembership, SalesAttribution, SocialHandle, User};
use crate::idgen::IdGenerator;
use crate::pipeline::validate::{FlexValue, RawParticipant, RawProgram, RawTask};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Placeholder used when a program entry carries no usable name. Programs
/// stuck with it are not promoted into the membership list.
const UNKNOWN_PROGRAM: &str = "Unknown Program";

/// Numeric timestamps at or above this magnitude are epoch milliseconds,
/// below it epoch seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 10_000_000_000.0;

/// Maps validated raw records into canonical users. Pure: malformed fields
/// degrade to safe defaults, they never fail the record.
pub struct Transformer {
    idgen: Arc<dyn IdGenerator>,
}

impl Transformer {
    pub fn new(idgen: Arc<dyn IdGenerator>) -> Self {
        Self { idgen }
    }

    pub fn transform(&self, raw: &RawParticipant) -> User {
        let id = raw
            .user_id
            .as_ref()
            .and_then(FlexValue::as_text)
            .unwrap_or_else(|| self.idgen.user_id());

        let mut user = User::new(id);
        user.name = raw.name.as_ref().and_then(FlexValue::as_text);
        user.email = raw.email.as_ref().and_then(FlexValue::as_text);
        user.join_date = raw.join_date.as_ref().and_then(parse_timestamp);

        self.collect_handles(raw, &mut user);
        self.collect_programs(raw, &mut user);

        user.recompute_totals();
        user
    }

    /// Promotes dedicated per-platform fields and the handles list into the
    /// normalized handle set. Entries missing platform or handle are dropped.
    fn collect_handles(&self, raw: &RawParticipant, user: &mut User) {
        let direct_fields: [(Platform, &Option<FlexValue>); 6] = [
            (Platform::Instagram, &raw.instagram_handle),
            (Platform::Tiktok, &raw.tiktok_handle),
            (Platform::Twitter, &raw.twitter_handle),
            (Platform::Facebook, &raw.facebook_handle),
            (Platform::Youtube, &raw.youtube_handle),
            (Platform::Linkedin, &raw.linkedin_handle),
        ];
        for (platform, field) in direct_fields {
            if let Some(handle) = field.as_ref().and_then(FlexValue::as_text) {
                push_handle(user, platform, &handle);
            }
        }

        if let Some(entries) = &raw.social_handles {
            for entry in entries.clone().into_vec() {
                let platform = entry
                    .platform
                    .as_ref()
                    .and_then(FlexValue::as_text)
                    .map(|p| Platform::parse(&p));
                let handle = entry.handle.as_ref().and_then(FlexValue::as_text);
                if let (Some(platform), Some(handle)) = (platform, handle) {
                    push_handle(user, platform, &handle);
                }
            }
        }
    }

    fn collect_programs(&self, raw: &RawParticipant, user: &mut User) {
        let Some(programs) = &raw.advocacy_programs else {
            return;
        };

        for program in programs.clone().into_vec() {
            let source_id = program.program_id.as_ref().and_then(FlexValue::as_text);
            let name = program
                .brand
                .as_ref()
                .and_then(FlexValue::as_text)
                .unwrap_or_else(|| UNKNOWN_PROGRAM.to_string());

            // Memberships need a real name; posts and sales beneath the
            // program are absorbed either way.
            if name != UNKNOWN_PROGRAM {
                let membership_id = source_id
                    .clone()
                    .unwrap_or_else(|| self.idgen.program_id());
                if !user.programs.iter().any(|m| m.program_id == membership_id) {
                    user.programs.push(ProgramMembership {
                        program_id: membership_id,
                        program_name: name,
                    });
                }
            }

            if let Some(tasks) = &program.tasks_completed {
                for task in tasks.clone().into_vec() {
                    user.posts.push(self.to_post(&task));
                }
            }

            // Attribution requires the source program id and a positive
            // coerced amount; everything else is silently dropped.
            if let Some(program_id) = source_id {
                let amount = program
                    .total_sales_attributed
                    .as_ref()
                    .and_then(FlexValue::as_f64)
                    .unwrap_or(0.0);
                if amount > 0.0 {
                    user.sales_attributions.push(SalesAttribution {
                        program_id,
                        amount,
                    });
                }
            }
        }
    }

    fn to_post(&self, task: &RawTask) -> Post {
        let post_id = task
            .task_id
            .as_ref()
            .and_then(FlexValue::as_text)
            .unwrap_or_else(|| self.idgen.post_id());
        let platform = task
            .platform
            .as_ref()
            .and_then(FlexValue::as_text)
            .map(|p| Platform::parse(&p))
            .unwrap_or(Platform::Other);
        let url = task.url.as_ref().and_then(FlexValue::as_text);

        let likes = coerce_count(&task.likes);
        let comments = coerce_count(&task.comments);
        let shares = coerce_count(&task.shares);
        let reach = coerce_count(&task.reach);

        Post {
            post_id,
            platform,
            url,
            likes,
            comments,
            shares,
            reach,
            engagement: Post::engagement_of(likes, comments, shares),
        }
    }
}

fn push_handle(user: &mut User, platform: Platform, raw_handle: &str) {
    let handle = normalize_handle(raw_handle);
    if handle.is_empty() {
        return;
    }
    let exists = user
        .social_handles
        .iter()
        .any(|h| h.platform == platform && h.handle == handle);
    if !exists {
        user.social_handles.push(SocialHandle { platform, handle });
    }
}

/// Strips one-or-more leading `@`s, lower-cases, trims.
fn normalize_handle(raw: &str) -> String {
    raw.trim().trim_start_matches('@').trim().to_lowercase()
}

/// Non-numeric, NaN, or unparsable counters become 0, never NaN.
fn coerce_count(value: &Option<FlexValue>) -> u64 {
    value
        .as_ref()
        .and_then(FlexValue::as_f64)
        .filter(|v| *v > 0.0)
        .map(|v| v as u64)
        .unwrap_or(0)
}

/// Parses a timestamp from epoch seconds, epoch millis, or a date string.
/// Unparsable values yield no date rather than an error.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt.and_utc());
            }
            for format in ["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y"] {
                if let Ok(day) = NaiveDate::parse_from_str(s, format) {
                    return day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
                }
            }
            s.parse::<f64>().ok().and_then(from_epoch)
        }
        _ => None,
    }
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    if value.abs() < EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp(value as i64, 0)
    } else {
        DateTime::from_timestamp_millis(value as i64)
    }
}
