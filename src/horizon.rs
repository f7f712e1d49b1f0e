//! The simulated years and the transition regimes that partition them.

use bluecarbon_core::errors::{CarbonError, CarbonResult};
use bluecarbon_core::Year;
use std::ops::Range;

/// A half-open interval of years `[start, end)` with constant landcover.
///
/// The baseline regime starts at the baseline year; every other regime starts
/// at a transition year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regime {
    pub start: Year,
    pub end: Year,
    /// Year of the snapshot in effect before `start`, `None` for the baseline regime
    pub previous_snapshot: Option<Year>,
}

impl Regime {
    pub fn is_baseline(&self) -> bool {
        self.previous_snapshot.is_none()
    }

    pub fn years(&self) -> Range<Year> {
        self.start..self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Baseline year, transition years and the final year of a run.
///
/// Stocks are defined for every year in `baseline..=end`; yearly fluxes
/// (accumulation, emissions, net sequestration) for every year in
/// `baseline..end`, each flux carrying the stock of its year into the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Horizon {
    baseline: Year,
    transitions: Vec<Year>,
    end: Year,
}

impl Horizon {
    /// Validate the years of a run.
    ///
    /// Transition years must be unique and after the baseline. Without an
    /// analysis year the horizon ends at the last transition; an analysis year
    /// before the last transition is rejected.
    pub fn new(
        baseline: Year,
        transitions: &[Year],
        analysis_year: Option<Year>,
    ) -> CarbonResult<Self> {
        let mut transitions = transitions.to_vec();
        transitions.sort_unstable();
        for pair in transitions.windows(2) {
            if pair[0] == pair[1] {
                return Err(CarbonError::DuplicateTransitionYear(pair[0]));
            }
        }
        if let Some(&first) = transitions.first() {
            if first <= baseline {
                return Err(CarbonError::TransitionBeforeBaseline {
                    baseline,
                    transition: first,
                });
            }
        }

        let last_transition = transitions.last().copied();
        let end = match (analysis_year, last_transition) {
            (Some(analysis), Some(last)) if analysis < last => {
                return Err(CarbonError::AnalysisYearBeforeLastTransition {
                    analysis,
                    last_transition: last,
                })
            }
            (Some(analysis), _) => analysis,
            (None, Some(last)) => last,
            (None, None) => return Err(CarbonError::MissingHorizonEnd),
        };
        if end <= baseline {
            return Err(CarbonError::InvalidConfiguration(format!(
                "the analysis year {} must be after the baseline year {}",
                end, baseline
            )));
        }

        Ok(Self {
            baseline,
            transitions,
            end,
        })
    }

    pub fn baseline(&self) -> Year {
        self.baseline
    }

    /// Transition years in ascending order.
    pub fn transitions(&self) -> &[Year] {
        &self.transitions
    }

    pub fn end(&self) -> Year {
        self.end
    }

    /// Years with a stock raster, `baseline..=end`.
    pub fn stock_years(&self) -> impl Iterator<Item = Year> {
        self.baseline..=self.end
    }

    /// Baseline, every transition and the final year, without repeats.
    pub fn reporting_years(&self) -> Vec<Year> {
        let mut years = vec![self.baseline];
        years.extend(self.transitions.iter().copied());
        if years.last() != Some(&self.end) {
            years.push(self.end);
        }
        years
    }

    /// One span per snapshot, the last one empty when the final year is a
    /// transition year.
    fn spans(&self) -> Vec<Regime> {
        let mut starts = vec![self.baseline];
        starts.extend(self.transitions.iter().copied());

        starts
            .iter()
            .enumerate()
            .map(|(index, &start)| Regime {
                start,
                end: starts.get(index + 1).copied().unwrap_or(self.end),
                previous_snapshot: index.checked_sub(1).map(|i| starts[i]),
            })
            .collect()
    }

    /// The non-empty regimes, in order.
    ///
    /// A transition that coincides with the final year starts no regime; see
    /// [`Horizon::closing_transition`].
    pub fn regimes(&self) -> Vec<Regime> {
        self.spans()
            .into_iter()
            .filter(|regime| !regime.is_empty())
            .collect()
    }

    /// The transition in the final year, as an empty regime.
    ///
    /// It has no yearly fluxes but the landscape is still disturbed, so the
    /// disturbance rasters of that year exist.
    pub fn closing_transition(&self) -> Option<Regime> {
        self.spans().into_iter().find(|regime| regime.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regimes_partition_the_horizon() {
        let horizon = Horizon::new(2000, &[2010, 2005], Some(2020)).unwrap();

        assert_eq!(horizon.transitions(), &[2005, 2010]);
        let regimes = horizon.regimes();
        assert_eq!(
            regimes,
            vec![
                Regime {
                    start: 2000,
                    end: 2005,
                    previous_snapshot: None,
                },
                Regime {
                    start: 2005,
                    end: 2010,
                    previous_snapshot: Some(2000),
                },
                Regime {
                    start: 2010,
                    end: 2020,
                    previous_snapshot: Some(2005),
                },
            ]
        );
        assert!(regimes[0].is_baseline());
        assert_eq!(horizon.closing_transition(), None);
        assert_eq!(regimes.iter().map(|r| r.len()).sum::<u32>(), 20);
        assert_eq!(horizon.reporting_years(), vec![2000, 2005, 2010, 2020]);
    }

    #[test]
    fn horizon_ends_at_last_transition_by_default() {
        let horizon = Horizon::new(2000, &[2005, 2010], None).unwrap();
        assert_eq!(horizon.end(), 2010);
        assert_eq!(horizon.regimes().len(), 2);
        assert_eq!(
            horizon.closing_transition(),
            Some(Regime {
                start: 2010,
                end: 2010,
                previous_snapshot: Some(2005),
            })
        );
        assert_eq!(horizon.reporting_years(), vec![2000, 2005, 2010]);
        assert_eq!(horizon.stock_years().count(), 11);
    }

    #[test]
    fn no_transitions() {
        let horizon = Horizon::new(2000, &[], Some(2003)).unwrap();
        assert_eq!(
            horizon.regimes(),
            vec![Regime {
                start: 2000,
                end: 2003,
                previous_snapshot: None,
            }]
        );
        assert_eq!(horizon.closing_transition(), None);
    }

    #[test]
    fn invalid_years() {
        assert!(matches!(
            Horizon::new(2000, &[2005, 2005], None),
            Err(CarbonError::DuplicateTransitionYear(2005))
        ));
        assert!(matches!(
            Horizon::new(2000, &[2000], None),
            Err(CarbonError::TransitionBeforeBaseline { .. })
        ));
        assert!(matches!(
            Horizon::new(2000, &[2005, 2010], Some(2008)),
            Err(CarbonError::AnalysisYearBeforeLastTransition {
                analysis: 2008,
                last_transition: 2010
            })
        ));
        assert!(matches!(
            Horizon::new(2000, &[], None),
            Err(CarbonError::MissingHorizonEnd)
        ));
        let err = Horizon::new(2000, &[], Some(1999)).unwrap_err();
        assert!(matches!(err, CarbonError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("1999"));
    }
}
