//! Quality ladder policy.
//!
//! Pure and deterministic: the same source height always yields the same
//! rung list and encode parameters. The bucketed table is authoritative for
//! the heights it lists; anything else falls back to a multiplicative rule
//! (double for the upscale target) as a best-effort default. The two schemes
//! disagree at bucket boundaries on purpose, the table wins.

/// Target heights per source-height bucket, ascending; every list contains
/// its own bucket, and the maximum entry is the super-resolution target.
const LADDER_TABLE: &[(u32, &[u32])] = &[
    (240, &[240, 360, 480]),
    (360, &[240, 360, 480, 720]),
    (480, &[240, 360, 480, 720, 1080]),
    (720, &[240, 360, 480, 720, 1080, 1440]),
    (1080, &[240, 360, 480, 720, 1080, 1440, 2160]),
    (1440, &[240, 360, 480, 720, 1080, 1440, 2160, 4320]),
    (2160, &[240, 360, 480, 720, 1080, 1440, 2160, 4320, 8640]),
    (4320, &[240, 360, 480, 720, 1080, 1440, 2160, 4320, 8640, 17280]),
];

/// CRF per standard rung: lower resolutions compress harder.
const CRF_TABLE: &[(u32, u8)] = &[
    (17280, 8),
    (8640, 12),
    (4320, 14),
    (2160, 16),
    (1440, 17),
    (1080, 18),
    (720, 20),
    (480, 22),
    (360, 24),
    (240, 26),
];

/// CRF for heights outside the standard rungs.
const FALLBACK_CRF: u8 = 23;

/// The ordered (ascending) output heights to produce for a source height.
///
/// The last entry is the upscale target rendered by the frame pipeline; each
/// earlier entry is a downscale transcode of it. Heights without a table
/// bucket get `[h, 2h]`: upscale to double, one transcode back at the
/// original height.
pub fn ladder(source_height: u32) -> Vec<u32> {
    for &(bucket, targets) in LADDER_TABLE {
        if bucket == source_height {
            return targets.to_vec();
        }
    }
    vec![source_height, source_height.saturating_mul(2)]
}

/// Encode quality (CRF) for one rung.
pub fn crf_for(height: u32) -> u8 {
    CRF_TABLE
        .iter()
        .find(|&&(h, _)| h == height)
        .map(|&(_, crf)| crf)
        .unwrap_or(FALLBACK_CRF)
}
