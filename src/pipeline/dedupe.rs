use crate::domain::User;
use std::collections::HashMap;

// Completeness-score weights. Tunable policy: the relative ordering
// (sales > programs > handles > the rest) is what matters.
const NAME_WEIGHT: f64 = 1.0;
const EMAIL_WEIGHT: f64 = 1.0;
const JOIN_DATE_WEIGHT: f64 = 1.0;
const HANDLE_WEIGHT: f64 = 2.0;
const PROGRAM_WEIGHT: f64 = 3.0;
const POST_WEIGHT: f64 = 1.0;
const SALES_WEIGHT: f64 = 5.0;

/// Heuristic measure of how much structured data an entity carries. Raw
/// engagement and sales totals are added directly so higher-volume accounts
/// outrank structurally-equal lower-volume ones.
pub fn completeness_score(user: &User) -> f64 {
    let mut score = 0.0;
    if user.name.as_deref().is_some_and(|n| !n.is_empty()) {
        score += NAME_WEIGHT;
    }
    if user.email.as_deref().is_some_and(|e| !e.is_empty()) {
        score += EMAIL_WEIGHT;
    }
    if user.join_date.is_some() {
        score += JOIN_DATE_WEIGHT;
    }
    score += HANDLE_WEIGHT * user.social_handles.len() as f64;
    score += PROGRAM_WEIGHT * user.programs.len() as f64;
    score += POST_WEIGHT * user.posts.len() as f64;
    score += SALES_WEIGHT * user.sales_attributions.len() as f64;
    score += user.total_engagement as f64;
    score += user.total_sales;
    score
}

/// Resolves two entities with the same identifier: the strictly
/// higher-scored one wins outright; equal scores merge. Totals of the
/// result are recomputed, never carried over.
pub fn resolve_duplicate(a: User, b: User) -> User {
    // An identical duplicate carries no new information; summing its sales
    // would double-count a record that was simply ingested twice.
    if a == b {
        let mut resolved = a;
        resolved.recompute_totals();
        return resolved;
    }

    let score_a = completeness_score(&a);
    let score_b = completeness_score(&b);

    let mut resolved = if score_a > score_b {
        a
    } else if score_b > score_a {
        b
    } else {
        merge_users(a, b)
    };
    resolved.recompute_totals();
    resolved
}

/// Merges two equal-score entities. Scalar fields prefer the first operand;
/// collections union-dedupe by their natural keys; same-program sales
/// amounts are summed rather than concatenated.
pub fn merge_users(a: User, b: User) -> User {
    let mut merged = a;

    if merged.name.as_deref().map_or(true, str::is_empty) {
        merged.name = b.name;
    }
    if merged.email.as_deref().map_or(true, str::is_empty) {
        merged.email = b.email;
    }
    if merged.join_date.is_none() {
        merged.join_date = b.join_date;
    }

    for handle in b.social_handles {
        let exists = merged
            .social_handles
            .iter()
            .any(|h| h.platform == handle.platform && h.handle == handle.handle);
        if !exists {
            merged.social_handles.push(handle);
        }
    }

    for membership in b.programs {
        let exists = merged
            .programs
            .iter()
            .any(|m| m.program_id == membership.program_id);
        if !exists {
            merged.programs.push(membership);
        }
    }

    for post in b.posts {
        match merged.posts.iter_mut().find(|p| p.post_id == post.post_id) {
            Some(existing) => {
                if post.engagement > existing.engagement {
                    *existing = post;
                }
            }
            None => merged.posts.push(post),
        }
    }

    for attribution in b.sales_attributions {
        match merged
            .sales_attributions
            .iter_mut()
            .find(|s| s.program_id == attribution.program_id)
        {
            Some(existing) => existing.amount += attribution.amount,
            None => merged.sales_attributions.push(attribution),
        }
    }

    merged.recompute_totals();
    merged
}

/// Collapses a batch so each identifier appears once, preserving first-seen
/// order. Every surviving entity leaves with freshly recomputed totals.
pub fn dedupe_batch(batch: Vec<User>) -> Vec<User> {
    let mut order: Vec<String> = Vec::new();
    let mut resolved: HashMap<String, User> = HashMap::new();

    for user in batch {
        match resolved.remove(&user.id) {
            Some(existing) => {
                let id = user.id.clone();
                resolved.insert(id, resolve_duplicate(existing, user));
            }
            None => {
                order.push(user.id.clone());
                resolved.insert(user.id.clone(), user);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            resolved.remove(&id).map(|mut user| {
                user.recompute_totals();
                user
            })
        })
        .collect()
}
