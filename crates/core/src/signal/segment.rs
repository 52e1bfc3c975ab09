/// Shape of the value between two consecutive automation events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Curve {
    Constant { value: f64 },
    Linear { from: f64, to: f64 },
    Exponential { from: f64, to: f64 },
    Target { from: f64, target: f64, time_constant: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Segment {
    pub start: f64,
    /// `f64::INFINITY` for the trailing segment.
    pub end: f64,
    pub curve: Curve,
    /// Integral of the value from time zero up to `start`.
    pub area_at_start: f64,
}

const FLAT_SLOPE: f64 = 1e-12;
const SOLVER_ITERATIONS: usize = 128;

impl Segment {
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Value `dt` seconds into the segment.
    pub fn value_at(&self, dt: f64) -> f64 {
        let length = self.length();
        match self.curve {
            Curve::Constant { value } => value,
            Curve::Linear { from, to } => {
                if length <= 0.0 {
                    to
                } else {
                    from + (to - from) * (dt / length)
                }
            }
            Curve::Exponential { from, to } => {
                if length <= 0.0 {
                    to
                } else {
                    from * (to / from).powf(dt / length)
                }
            }
            Curve::Target {
                from,
                target,
                time_constant,
            } => target + (from - target) * (-dt / time_constant).exp(),
        }
    }

    /// Value at the end of the segment (its start when it never ends).
    pub fn final_value(&self) -> f64 {
        if self.end.is_finite() {
            self.value_at(self.length())
        } else {
            self.value_at(0.0)
        }
    }

    /// Integral of the value over `[start, start + dt]`.
    pub fn area(&self, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }
        let length = self.length();
        match self.curve {
            Curve::Constant { value } => value * dt,
            Curve::Linear { from, to } => {
                if length <= 0.0 {
                    return 0.0;
                }
                let slope = (to - from) / length;
                from * dt + 0.5 * slope * dt * dt
            }
            Curve::Exponential { from, to } => {
                if length <= 0.0 {
                    return 0.0;
                }
                let rate = (to / from).ln() / length;
                if rate.abs() < FLAT_SLOPE {
                    from * dt
                } else {
                    from * (rate * dt).exp_m1() / rate
                }
            }
            Curve::Target {
                from,
                target,
                time_constant,
            } => target * dt - (from - target) * time_constant * (-dt / time_constant).exp_m1(),
        }
    }

    /// Integral over the whole segment. Infinite for a trailing segment
    /// that keeps accumulating.
    pub fn total_area(&self) -> f64 {
        if self.end.is_finite() {
            self.area(self.length())
        } else if self.final_value() > 0.0 {
            f64::INFINITY
        } else {
            match self.curve {
                Curve::Target {
                    from,
                    target,
                    time_constant,
                } if target <= 0.0 => ((from - target) * time_constant).max(0.0),
                _ => 0.0,
            }
        }
    }

    /// Smallest `dt` with `area(dt) == area`, or `f64::INFINITY` when the
    /// segment never accumulates that much.
    pub fn solve(&self, area: f64) -> f64 {
        if area <= 0.0 {
            return 0.0;
        }
        let length = self.length();
        let dt = match self.curve {
            Curve::Constant { value } => solve_constant(value, area),
            Curve::Linear { from, to } => {
                if length <= 0.0 {
                    f64::INFINITY
                } else {
                    solve_linear(from, (to - from) / length, area)
                }
            }
            Curve::Exponential { from, to } => {
                if length <= 0.0 {
                    f64::INFINITY
                } else {
                    solve_exponential(from, (to / from).ln() / length, area)
                }
            }
            Curve::Target {
                from,
                target,
                time_constant,
            } => self.solve_target(from, target, time_constant, area),
        };

        if dt.is_finite() && length.is_finite() {
            dt.min(length)
        } else {
            dt
        }
    }

    fn solve_target(&self, from: f64, target: f64, time_constant: f64, area: f64) -> f64 {
        let gap = from - target;
        if target.abs() < FLAT_SLOPE {
            // Pure decay towards zero: the area is bounded by gap * tau.
            let ceiling = gap * time_constant;
            if ceiling <= 0.0 || area >= ceiling {
                return f64::INFINITY;
            }
            return -time_constant * (-area / ceiling).ln_1p();
        }
        if target < 0.0 {
            return f64::INFINITY;
        }

        // No closed form once the target is non-zero. The area grows
        // monotonically, so bracket it and refine with safeguarded Newton
        // steps seeded from the bracket midpoint.
        let mut lo = 0.0;
        let mut hi = (area - gap.min(0.0) * time_constant) / target;
        let mut x = 0.5 * (lo + hi);
        let tolerance = 1e-12 * area.max(1.0);
        for _ in 0..SOLVER_ITERATIONS {
            let residual = self.area(x) - area;
            if residual.abs() <= tolerance {
                break;
            }
            if residual > 0.0 {
                hi = x;
            } else {
                lo = x;
            }
            let slope = self.value_at(x);
            let newton = if slope > 0.0 { x - residual / slope } else { f64::NAN };
            x = if newton > lo && newton < hi {
                newton
            } else {
                0.5 * (lo + hi)
            };
            if hi - lo <= f64::EPSILON * hi.max(1.0) {
                break;
            }
        }
        x
    }
}

fn solve_constant(value: f64, area: f64) -> f64 {
    if value > 0.0 {
        area / value
    } else {
        f64::INFINITY
    }
}

fn solve_linear(from: f64, slope: f64, area: f64) -> f64 {
    if slope.abs() < FLAT_SLOPE {
        return solve_constant(from, area);
    }
    let discriminant = from * from + 2.0 * slope * area;
    if discriminant < 0.0 {
        return f64::INFINITY;
    }
    // Rationalised root, stable when `from` dominates the square root.
    let denominator = from + discriminant.sqrt();
    if denominator <= 0.0 {
        f64::INFINITY
    } else {
        2.0 * area / denominator
    }
}

fn solve_exponential(from: f64, rate: f64, area: f64) -> f64 {
    if rate.abs() < FLAT_SLOPE {
        return solve_constant(from, area);
    }
    let scaled = rate * area / from;
    if scaled <= -1.0 {
        f64::INFINITY
    } else {
        scaled.ln_1p() / rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(curve: Curve, length: f64) -> Segment {
        Segment {
            start: 1.0,
            end: 1.0 + length,
            curve,
            area_at_start: 0.0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn full_segment_integrals_match_closed_forms() {
        let linear = segment(Curve::Linear { from: 2.0, to: 6.0 }, 2.0);
        assert!(close(linear.total_area(), 8.0));

        let exp = segment(Curve::Exponential { from: 1.0, to: 4.0 }, 1.0);
        assert!(close(exp.total_area(), 3.0 / 4f64.ln()));

        let target = segment(
            Curve::Target {
                from: 1.0,
                target: 0.0,
                time_constant: 0.5,
            },
            f64::INFINITY,
        );
        assert!(close(target.total_area(), 0.5));
    }

    #[test]
    fn solve_inverts_area() {
        let curves = [
            Curve::Constant { value: 3.0 },
            Curve::Linear { from: 1.0, to: 5.0 },
            Curve::Linear { from: 5.0, to: 0.0 },
            Curve::Exponential { from: 2.0, to: 0.5 },
            Curve::Target {
                from: 1.0,
                target: 4.0,
                time_constant: 0.3,
            },
            Curve::Target {
                from: 6.0,
                target: 2.0,
                time_constant: 0.7,
            },
        ];
        for curve in curves {
            let seg = segment(curve, 2.0);
            for dt in [0.1, 0.5, 1.0, 1.9] {
                let area = seg.area(dt);
                let solved = seg.solve(area);
                assert!((solved - dt).abs() < 1e-7, "{curve:?}: {solved} vs {dt}");
            }
        }
    }

    #[test]
    fn unreachable_areas_are_infinite() {
        let silent = segment(Curve::Constant { value: 0.0 }, f64::INFINITY);
        assert!(silent.solve(1.0).is_infinite());

        let decay = segment(
            Curve::Target {
                from: 2.0,
                target: 0.0,
                time_constant: 1.0,
            },
            f64::INFINITY,
        );
        assert!(decay.solve(1.9).is_finite());
        assert!(decay.solve(2.0).is_infinite());
    }
}
