/// Mean of whole-millisecond values, rounded half up to the nearest millisecond.
pub fn rounded_mean(data: &[u64]) -> Option<u64> {
    let count = data.len() as u128;

    match count {
        positive if positive > 0 => {
            let sum = data.iter().map(|&v| v as u128).sum::<u128>();
            // floor(sum / count + 1/2) without leaving integer arithmetic
            Some(((2 * sum + count) / (2 * count)) as u64)
        }
        _ => None,
    }
}

pub fn std_dev(data: &[u64]) -> Option<f64> {
    let count = data.len();
    if count == 0 {
        return None;
    }

    let data_mean = data.iter().map(|&v| v as f64).sum::<f64>() / count as f64;
    let variance = data
        .iter()
        .map(|&value| {
            let diff = data_mean - value as f64;

            diff * diff
        })
        .sum::<f64>()
        / count as f64;

    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_mean() {
        assert_eq!(rounded_mean(&[1200, 1500, 1300]), Some(1333));
        assert_eq!(rounded_mean(&[10, 20, 30]), Some(20));
    }

    #[test]
    fn test_rounded_mean_rounds_half_up() {
        assert_eq!(rounded_mean(&[1000, 1001]), Some(1001));
        assert_eq!(rounded_mean(&[1, 2, 2]), Some(2));
        assert_eq!(rounded_mean(&[1, 1, 2]), Some(1));
    }

    #[test]
    fn test_rounded_mean_empty_slice() {
        assert_eq!(rounded_mean(&[]), None);
    }

    #[test]
    fn test_rounded_mean_does_not_overflow() {
        assert_eq!(rounded_mean(&[u64::MAX, u64::MAX]), Some(u64::MAX));
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(std_dev(&[100, 120, 90, 102, 94]), Some(10.322790320451151));
        assert_eq!(std_dev(&[42]), Some(0.0));
        assert_eq!(std_dev(&[]), None);
    }
}
