use super::Graph;
use crate::config::LayoutConfig;

use std::f64::consts::PI;

// Linear congruential generator, only used to break ties between coincident
// nodes. Seeded the same for every layout so identical graphs settle
// identically.
struct Lcg(u64);

impl Lcg {
    const A: u64 = 1_664_525;
    const C: u64 = 1_013_904_223;
    const M: u64 = 1 << 32;

    fn next(&mut self) -> f64 {
        self.0 = (Self::A * self.0 + Self::C) % Self::M;
        self.0 as f64 / Self::M as f64
    }

    fn jiggle(&mut self) -> f64 {
        (self.next() - 0.5) * 1e-6
    }
}

/// Iterative force directed layout over a [`Graph`].
///
/// Four forces are applied every step, in order: link, charge, center and
/// collision. Forces add to node velocities (the center force shifts
/// positions directly), then velocities decay and move the nodes.
pub struct ForceLayout {
    config: LayoutConfig,
    center: (f64, f64),
    alpha: f64,
    alpha_decay: f64,
    steps: usize,
    rng: Lcg,
    link_strength: Vec<f64>,
    link_bias: Vec<f64>,
}

impl ForceLayout {
    /// Places the nodes of `graph` on a spiral around the canvas center and
    /// prepares the link force for its current links.
    pub fn new(graph: &mut Graph, config: LayoutConfig, width: f64, height: f64) -> Self {
        let center = (width / 2.0, height / 2.0);
        let initial_angle = PI * (3.0 - 5f64.sqrt());

        for (i, node) in graph.nodes.iter_mut().enumerate() {
            let radius = 10.0 * (0.5 + i as f64).sqrt();
            let angle = i as f64 * initial_angle;

            node.x = center.0 + radius * angle.cos();
            node.y = center.1 + radius * angle.sin();
            node.vx = 0.0;
            node.vy = 0.0;
        }

        let mut degree = vec![0usize; graph.nodes.len()];
        for link in graph.links.iter().filter(|link| link.source != link.target) {
            degree[link.source] += 1;
            degree[link.target] += 1;
        }

        let mut link_strength = Vec::with_capacity(graph.links.len());
        let mut link_bias = Vec::with_capacity(graph.links.len());
        for link in &graph.links {
            let (s, t) = (degree[link.source].max(1), degree[link.target].max(1));

            link_strength.push(1.0 / s.min(t) as f64);
            link_bias.push(s as f64 / (s + t) as f64);
        }

        Self {
            config,
            center,
            alpha: 1.0,
            alpha_decay: config.alpha_decay(),
            steps: 0,
            rng: Lcg(1),
            link_strength,
            link_bias,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_converged(&self, graph: &Graph) -> bool {
        if self.steps >= self.config.max_steps || self.alpha < self.config.alpha_min {
            return true;
        }

        self.steps > 0 && graph.kinetic_energy() < self.config.energy_threshold
    }

    /// Advances the layout by one step.
    pub fn step(&mut self, graph: &mut Graph) {
        self.alpha -= self.alpha * self.alpha_decay;

        self.apply_link(graph);
        self.apply_charge(graph);
        self.apply_center(graph);
        self.apply_collide(graph);

        let keep = 1.0 - self.config.velocity_decay;
        for node in &mut graph.nodes {
            node.vx *= keep;
            node.vy *= keep;
            node.x += node.vx;
            node.y += node.vy;
        }

        self.steps += 1;
    }

    /// Steps until converged, calling `on_tick` after every step. Returns the
    /// number of steps taken.
    pub fn run<F>(&mut self, graph: &mut Graph, mut on_tick: F) -> usize
    where
        F: FnMut(&Graph),
    {
        let start = self.steps;

        while !self.is_converged(graph) {
            self.step(graph);
            on_tick(graph);
        }

        self.steps - start
    }

    fn apply_link(&mut self, graph: &mut Graph) {
        for (i, link) in graph.links.iter().enumerate() {
            // a self reference has no direction to pull along
            if link.source == link.target {
                continue;
            }

            let (s, t) = (&graph.nodes[link.source], &graph.nodes[link.target]);
            let mut x = t.x + t.vx - s.x - s.vx;
            let mut y = t.y + t.vy - s.y - s.vy;
            if x == 0.0 {
                x = self.rng.jiggle();
            }
            if y == 0.0 {
                y = self.rng.jiggle();
            }

            let mut l = (x * x + y * y).sqrt();
            l = (l - self.config.link_distance) / l * self.alpha * self.link_strength[i];
            x *= l;
            y *= l;

            let bias = self.link_bias[i];
            let target = &mut graph.nodes[link.target];
            target.vx -= x * bias;
            target.vy -= y * bias;

            let source = &mut graph.nodes[link.source];
            source.vx += x * (1.0 - bias);
            source.vy += y * (1.0 - bias);
        }
    }

    fn apply_charge(&mut self, graph: &mut Graph) {
        let strength = self.config.charge_strength * self.alpha;
        let count = graph.nodes.len();

        for i in 0..count {
            let (mut dvx, mut dvy) = (0.0, 0.0);

            for j in 0..count {
                if i == j {
                    continue;
                }

                let mut x = graph.nodes[j].x - graph.nodes[i].x;
                let mut y = graph.nodes[j].y - graph.nodes[i].y;
                let mut l = x * x + y * y;
                if x == 0.0 {
                    x = self.rng.jiggle();
                    l += x * x;
                }
                if y == 0.0 {
                    y = self.rng.jiggle();
                    l += y * y;
                }
                // keep very close pairs from blowing up
                if l < 1.0 {
                    l = l.sqrt();
                }

                let w = strength / l;
                dvx += x * w;
                dvy += y * w;
            }

            graph.nodes[i].vx += dvx;
            graph.nodes[i].vy += dvy;
        }
    }

    fn apply_center(&self, graph: &mut Graph) {
        if graph.nodes.is_empty() {
            return;
        }

        let n = graph.nodes.len() as f64;
        let sx = graph.nodes.iter().map(|node| node.x).sum::<f64>() / n - self.center.0;
        let sy = graph.nodes.iter().map(|node| node.y).sum::<f64>() / n - self.center.1;

        for node in &mut graph.nodes {
            node.x -= sx;
            node.y -= sy;
        }
    }

    fn apply_collide(&mut self, graph: &mut Graph) {
        let radius = self.config.collide_radius;
        let reach = radius + radius;
        // equal radii share the push evenly
        let share = 0.5;
        let count = graph.nodes.len();

        for i in 0..count {
            let xi = graph.nodes[i].x + graph.nodes[i].vx;
            let yi = graph.nodes[i].y + graph.nodes[i].vy;

            for j in (i + 1)..count {
                let mut x = xi - (graph.nodes[j].x + graph.nodes[j].vx);
                let mut y = yi - (graph.nodes[j].y + graph.nodes[j].vy);
                let mut l = x * x + y * y;

                if l >= reach * reach {
                    continue;
                }

                if x == 0.0 {
                    x = self.rng.jiggle();
                    l += x * x;
                }
                if y == 0.0 {
                    y = self.rng.jiggle();
                    l += y * y;
                }

                l = l.sqrt();
                l = (reach - l) / l;
                x *= l;
                y *= l;

                graph.nodes[i].vx += x * share;
                graph.nodes[i].vy += y * share;
                graph.nodes[j].vx -= x * (1.0 - share);
                graph.nodes[j].vy -= y * (1.0 - share);
            }
        }
    }
}
