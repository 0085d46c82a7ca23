use rand::seq::SliceRandom;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AllocationError {
    #[error("not enough questions match the filters: {available} available, {requested} requested")]
    Insufficient { available: usize, requested: usize },
}

/// Eligible question ids for one bank, after the test's difficulty and
/// category filters have been applied.
pub(crate) struct BankPool {
    pub(crate) bank_id: String,
    pub(crate) question_ids: Vec<String>,
}

/// Per-bank quota split of `requested` questions.
///
/// Every bank starts from an even share, with the remainder going to the
/// earliest banks. Quotas are clamped to what each bank actually has,
/// and the shortfall is pushed onto later capacity in bank order.
pub(crate) fn plan_quotas(
    requested: usize,
    pool_sizes: &[usize],
) -> Result<Vec<usize>, AllocationError> {
    if pool_sizes.is_empty() {
        return Err(AllocationError::Insufficient { available: 0, requested });
    }

    let available: usize = pool_sizes.iter().sum();
    if available < requested {
        return Err(AllocationError::Insufficient { available, requested });
    }

    let base = requested / pool_sizes.len();
    let remainder = requested % pool_sizes.len();

    let mut quotas: Vec<usize> = pool_sizes
        .iter()
        .enumerate()
        .map(|(index, &size)| {
            let want = base + usize::from(index < remainder);
            want.min(size)
        })
        .collect();

    let mut deficit = requested - quotas.iter().sum::<usize>();
    for (quota, &size) in quotas.iter_mut().zip(pool_sizes) {
        if deficit == 0 {
            break;
        }
        let extra = (size - *quota).min(deficit);
        *quota += extra;
        deficit -= extra;
    }

    debug_assert_eq!(deficit, 0);
    Ok(quotas)
}

/// Draw the assigned question set for a new test: each bank contributes
/// its quota, sampled uniformly without replacement.
pub(crate) fn draw_questions(
    requested: usize,
    pools: &[BankPool],
) -> Result<Vec<String>, AllocationError> {
    let sizes: Vec<usize> = pools.iter().map(|pool| pool.question_ids.len()).collect();
    let quotas = plan_quotas(requested, &sizes)?;

    let mut rng = rand::thread_rng();
    let mut selected = Vec::with_capacity(requested);
    for (pool, quota) in pools.iter().zip(quotas) {
        let mut ids = pool.question_ids.clone();
        ids.shuffle(&mut rng);
        ids.truncate(quota);
        selected.extend(ids);
    }
    Ok(selected)
}
