use intonation_common::keyboard::KEY_COUNT;
use std::fs;
use std::path::Path;

/// Frequency of MIDI key 0 in standard tuning; TUN cents are measured from here.
pub const TUN_REFERENCE_HZ: f64 = 8.1757989156437073336;

/// Frequency of every key. Keys `base_key..base_key + ratios.len()` take the sorted ratios;
/// the rest follow 12-TET from the base frequency.
pub fn key_frequencies(ratios: &[f64], base_key: u8, base_frequency: f64) -> Vec<f64> {
    let mut sorted = ratios.to_vec();
    sorted.sort_by(f64::total_cmp);
    let base_key = base_key as usize;
    (0..KEY_COUNT)
        .map(|n| match n.checked_sub(base_key).and_then(|i| sorted.get(i)) {
            Some(r) => base_frequency * r,
            None => {
                let offset = n as f64 - base_key as f64;
                base_frequency * 2f64.powf(offset / 12.0)
            }
        })
        .collect()
}

pub fn absolute_cents(hz: f64) -> f64 {
    if hz > 0.0 {
        1200.0 * (hz / TUN_REFERENCE_HZ).log2()
    } else {
        0.0
    }
}

/// AnaMark TUN text: a `[Tuning]` section with `note N=cents` for all 128 keys.
pub fn render(ratios: &[f64], base_key: u8, base_frequency: f64) -> String {
    let mut out = String::from("[Tuning]\n");
    for (n, hz) in key_frequencies(ratios, base_key, base_frequency)
        .into_iter()
        .enumerate()
    {
        out.push_str(&format!("note {n}={:.10}\n", absolute_cents(hz)));
    }
    out
}

pub fn write(
    path: impl AsRef<Path>,
    ratios: &[f64],
    base_key: u8,
    base_frequency: f64,
) -> anyhow::Result<()> {
    fs::write(&path, render(ratios, base_key, base_frequency))?;
    println!("TUN file written to {}", path.as_ref().display());
    Ok(())
}
