//! Row/feature draws and vote counting shared by the bagged ensembles.
use ndarray::{ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data_handling::Label;
use crate::error::Result;

/// Hard predictions of one ensemble member on its own feature subset.
pub(crate) trait Vote {
    fn vote(&self, x: ArrayView2<f64>) -> Result<Vec<Label>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum MemberModel<M> {
    Fitted(M),
    /// The draw held a single class
    Constant(Label),
}

/// A fitted member together with the feature columns it was trained on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Member<M> {
    pub features: Vec<usize>,
    pub model: MemberModel<M>,
}

impl<M: Vote> Member<M> {
    fn vote(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
        match &self.model {
            MemberModel::Fitted(model) => model.vote(x.select(Axis(1), &self.features).view()),
            MemberModel::Constant(label) => Ok(vec![*label; x.nrows()]),
        }
    }
}

/// One seed per member, derived from `random_state` so members can be fitted in parallel.
pub(crate) fn member_seeds(random_state: u64, n_members: usize) -> Vec<u64> {
    let mut seeder = StdRng::seed_from_u64(random_state);
    (0..n_members).map(|_| seeder.gen()).collect()
}

/// `count` indices from `0..available`, with or without replacement.
pub(crate) fn draw(rng: &mut StdRng, available: usize, count: usize, replace: bool) -> Vec<usize> {
    if replace {
        (0..count).map(|_| rng.gen_range(0..available)).collect()
    } else {
        rand::seq::index::sample(rng, available, count.min(available)).into_vec()
    }
}

/// Fit a member on the drawn rows and columns, or record the only label the
/// draw contains.
pub(crate) fn fit_member<M, F>(
    x: ArrayView2<f64>,
    y: &[Label],
    rows: &[usize],
    features: Vec<usize>,
    fit: F,
) -> Result<Member<M>>
where
    F: FnOnce(ArrayView2<f64>, &[Label]) -> Result<M>,
{
    let member_y: Vec<Label> = rows.iter().map(|&r| y[r]).collect();
    let model = match member_y.first() {
        Some(&first) if member_y.iter().all(|&l| l == first) => MemberModel::Constant(first),
        _ => {
            let member_x = x.select(Axis(0), rows).select(Axis(1), &features);
            MemberModel::Fitted(fit(member_x.view(), &member_y)?)
        }
    };
    Ok(Member { features, model })
}

/// Fraction of members voting preictal, per row.
pub(crate) fn vote_fraction<M: Vote>(members: &[Member<M>], x: ArrayView2<f64>) -> Result<Vec<f64>> {
    let mut votes = vec![0.0; x.nrows()];
    for member in members {
        for (v, label) in votes.iter_mut().zip(member.vote(x)?) {
            if label.is_preictal() {
                *v += 1.0;
            }
        }
    }
    let n = members.len().max(1) as f64;
    Ok(votes.into_iter().map(|v| v / n).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct FirstColumnPositive;

    impl Vote for FirstColumnPositive {
        fn vote(&self, x: ArrayView2<f64>) -> Result<Vec<Label>> {
            Ok(x.column(0)
                .iter()
                .map(|&v| if v > 0.0 { Label::Preictal } else { Label::Interictal })
                .collect())
        }
    }

    #[test]
    fn test_draw_without_replacement_is_distinct() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut picked = draw(&mut rng, 10, 10, false);
        picked.sort_unstable();
        assert_eq!(picked, (0..10).collect::<Vec<_>>());
        assert_eq!(draw(&mut rng, 3, 8, true).len(), 8);
    }

    #[test]
    fn test_member_seeds_are_reproducible() {
        assert_eq!(member_seeds(7, 4), member_seeds(7, 4));
        assert_ne!(member_seeds(7, 4), member_seeds(8, 4));
    }

    #[test]
    fn test_single_class_draw_is_constant() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = [Label::Preictal, Label::Preictal, Label::Interictal];
        let member: Member<FirstColumnPositive> =
            fit_member(x.view(), &y, &[0, 1], vec![0], |_, _| Ok(FirstColumnPositive)).unwrap();
        assert!(matches!(member.model, MemberModel::Constant(Label::Preictal)));
    }

    #[test]
    fn test_votes_use_member_features() {
        let x = array![[-1.0, 1.0], [1.0, -1.0]];
        let members = vec![
            Member {
                features: vec![1],
                model: MemberModel::Fitted(FirstColumnPositive),
            },
            Member {
                features: vec![0],
                model: MemberModel::Fitted(FirstColumnPositive),
            },
            Member {
                features: vec![0],
                model: MemberModel::Constant(Label::Interictal),
            },
        ];
        let fractions = vote_fraction(&members, x.view()).unwrap();
        assert!((fractions[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((fractions[1] - 1.0 / 3.0).abs() < 1e-12);
    }
}
