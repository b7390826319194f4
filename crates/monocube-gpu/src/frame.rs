//! One-shot frame submission.
//!
//! The [`FrameDriver`] executes a single renderable frame against a
//! presentation surface: acquire image → record commands → submit →
//! wait → present. The calling thread drives the sequence while the
//! queue executes asynchronously, so the ordering is enforced with
//! explicit synchronization primitives rather than call order alone:
//!
//! - The image-acquired semaphore gates the submission at the
//!   color-attachment-output stage only. Earlier pipeline stages may
//!   overlap with acquisition; color writes may not.
//! - The render-complete fence orders submission completion against the
//!   CPU-side wait, with a bounded retry budget for slow GPUs.
//!
//! One frame in flight: the synchronization pair is single-use and must
//! not be reused before its fence has signaled. Extending this to N
//! frames in flight requires a fixed-size ring of synchronization pairs
//! (one per overlap slot) and per-pair free tracking.

use ash::vk;
use thiserror::Error;

use crate::error::GpuError;

/// A single draw call to encode into the frame's command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawCall {
    /// Single-instance draw of `vertex_count` vertices.
    pub fn new(vertex_count: u32) -> Self {
        Self {
            vertex_count,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
        }
    }
}

/// Immutable description of one frame. Lifetime = one submission.
#[derive(Debug, Clone)]
pub struct FrameRequest {
    /// Clear value for the color attachment.
    pub clear_color: [f32; 4],
    /// Clear value for the depth attachment.
    pub clear_depth: f32,
    /// Viewport/scissor rectangle.
    pub render_area: vk::Rect2D,
    /// Draw calls, encoded in order.
    pub draws: Vec<DrawCall>,
}

impl FrameRequest {
    /// Create a request covering `render_area` with default clear values.
    pub fn new(render_area: vk::Rect2D) -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_depth: 1.0,
            render_area,
            draws: Vec::new(),
        }
    }

    /// Set the color clear value.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Set the depth clear value.
    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.clear_depth = depth;
        self
    }

    /// Append a draw call.
    pub fn with_draw(mut self, draw: DrawCall) -> Self {
        self.draws.push(draw);
        self
    }
}

/// Terminal disposition of a successfully presented frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Frame rendered and presented.
    Success,
    /// Frame presented, but the surface properties no longer exactly
    /// match the swapchain. Non-fatal; the caller may want to recreate
    /// presentation resources before the next frame.
    Suboptimal,
}

/// Frame submission failures.
#[derive(Error, Debug)]
pub enum FrameError {
    /// No presentable image became available within the timeout.
    #[error("timed out waiting to acquire a presentable image")]
    AcquireTimeout,

    /// The presentation surface is no longer valid. The caller owns
    /// recreating presentation resources; this is never retried here.
    #[error("presentation surface lost")]
    SurfaceLost,

    /// The render fence did not signal within the retry budget.
    #[error("render fence not signaled after {attempts} wait attempt(s)")]
    RenderTimeout { attempts: u32 },

    /// Presentation reported a failure other than suboptimal.
    #[error("presentation failed: {0}")]
    PresentFailed(String),

    /// The acquired image index is outside `0..image_count`.
    #[error("acquired image index {index} out of range (image count {image_count})")]
    InvalidImageIndex { index: u32, image_count: u32 },

    /// Any other platform-level error, with its diagnostic.
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Failure kinds, for phase tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameErrorKind {
    AcquireTimeout,
    SurfaceLost,
    RenderTimeout,
    PresentFailed,
    InvalidImageIndex,
    Gpu,
}

impl FrameError {
    /// The kind of this error.
    pub fn kind(&self) -> FrameErrorKind {
        match self {
            Self::AcquireTimeout => FrameErrorKind::AcquireTimeout,
            Self::SurfaceLost => FrameErrorKind::SurfaceLost,
            Self::RenderTimeout { .. } => FrameErrorKind::RenderTimeout,
            Self::PresentFailed(_) => FrameErrorKind::PresentFailed,
            Self::InvalidImageIndex { .. } => FrameErrorKind::InvalidImageIndex,
            Self::Gpu(_) => FrameErrorKind::Gpu,
        }
    }
}

/// Driver state, advanced as `submit_frame` works through its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
    Failed(FrameErrorKind),
}

/// Image acquired from the swapchain.
#[derive(Debug, Clone, Copy)]
pub struct AcquiredImage {
    /// Index into the swapchain's image set.
    pub index: u32,
    /// Surface properties no longer exactly match the swapchain.
    pub suboptimal: bool,
}

/// Result of one fence wait attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    Signaled,
    /// Not necessarily fatal; the GPU may simply still be busy.
    TimedOut,
}

/// Result of a successful present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    Optimal,
    Suboptimal,
}

/// The execution surface the driver sequences against.
///
/// The production implementation records through ash against the real
/// device ([`monocube-render`]'s cube renderer); tests script a fake.
pub trait FrameBackend {
    /// Number of presentable images in the swapchain.
    fn image_count(&self) -> u32;

    /// Acquire the next presentable image, arranging for the
    /// image-acquired semaphore to signal when it is writable.
    fn acquire_image(&mut self, timeout_ns: u64) -> Result<AcquiredImage, FrameError>;

    /// Encode the request's commands into the command buffer targeting
    /// the framebuffer for `image_index`.
    fn record(&mut self, image_index: u32, request: &FrameRequest) -> Result<(), FrameError>;

    /// Submit the recorded commands to the graphics queue, waiting on
    /// the image-acquired semaphore at the color-attachment-output
    /// stage and signaling the render fence on completion.
    fn submit(&mut self, image_index: u32) -> Result<(), FrameError>;

    /// Wait on the render fence for at most `timeout_ns`.
    fn wait_render_fence(&mut self, timeout_ns: u64) -> Result<FenceStatus, FrameError>;

    /// Queue `image_index` for presentation, waiting on the
    /// render-finished semaphore.
    fn present(&mut self, image_index: u32) -> Result<PresentStatus, FrameError>;

    /// Block until the device has no outstanding work.
    fn wait_idle(&mut self) -> Result<(), FrameError>;
}

/// Executes one frame with correct cross-stage synchronization.
pub struct FrameDriver<B> {
    backend: B,
    wait_retries: u32,
    phase: FramePhase,
}

impl<B: FrameBackend> FrameDriver<B> {
    /// Create a driver over `backend` with no fence-wait retries.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            wait_retries: 0,
            phase: FramePhase::Idle,
        }
    }

    /// Set how many timed-out fence waits are retried before the frame
    /// fails with [`FrameError::RenderTimeout`].
    pub fn with_wait_retries(mut self, retries: u32) -> Self {
        self.wait_retries = retries;
        self
    }

    /// Current driver phase.
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Access the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Consume the driver, returning the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Execute one complete frame: acquire → record → submit → wait →
    /// present. `timeout_ns` bounds the acquire step and each fence
    /// wait attempt. One call is one attempt; nothing is retried across
    /// frames.
    pub fn submit_frame(
        &mut self,
        request: &FrameRequest,
        timeout_ns: u64,
    ) -> Result<FrameOutcome, FrameError> {
        let result = self.drive(request, timeout_ns);
        self.phase = match &result {
            Ok(_) => FramePhase::Idle,
            Err(e) => FramePhase::Failed(e.kind()),
        };
        result
    }

    fn drive(
        &mut self,
        request: &FrameRequest,
        timeout_ns: u64,
    ) -> Result<FrameOutcome, FrameError> {
        self.phase = FramePhase::Acquiring;
        let acquired = self.backend.acquire_image(timeout_ns)?;

        // The acquired index selects the render target for recording and
        // the present argument. A mismatched target is undefined
        // behavior, so an out-of-range index is rejected before any
        // recording happens.
        let image_count = self.backend.image_count();
        if acquired.index >= image_count {
            return Err(FrameError::InvalidImageIndex {
                index: acquired.index,
                image_count,
            });
        }

        self.phase = FramePhase::Recording;
        self.backend.record(acquired.index, request)?;

        self.phase = FramePhase::Submitted;
        self.backend.submit(acquired.index)?;

        // A timed-out wait may just mean the GPU is still busy; retry
        // within the configured budget.
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.backend.wait_render_fence(timeout_ns)? {
                FenceStatus::Signaled => break,
                FenceStatus::TimedOut if attempts > self.wait_retries => {
                    return Err(FrameError::RenderTimeout { attempts });
                }
                FenceStatus::TimedOut => {
                    tracing::debug!(attempts, "render fence wait timed out, retrying");
                }
            }
        }

        self.phase = FramePhase::Presenting;
        let status = self.backend.present(acquired.index)?;

        if acquired.suboptimal || status == PresentStatus::Suboptimal {
            Ok(FrameOutcome::Suboptimal)
        } else {
            Ok(FrameOutcome::Success)
        }
    }

    /// Hard synchronization point: block until the device is idle.
    /// Call before resource teardown.
    pub fn wait_idle(&mut self) -> Result<(), FrameError> {
        self.backend.wait_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Logical command recorded by the fake backend, mirroring what the
    /// production backend encodes.
    #[derive(Debug, Clone, PartialEq)]
    enum Command {
        BeginPass {
            clear_color: [f32; 4],
            clear_depth: f32,
        },
        BindPipeline,
        BindDescriptorSet,
        BindVertexBuffer,
        SetViewport,
        SetScissor,
        Draw {
            vertex_count: u32,
            instance_count: u32,
        },
        EndPass,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Acquire,
        Record(u32),
        Submit(u32),
        WaitFence,
        Present(u32),
        WaitIdle,
    }

    struct FakeBackend {
        image_count: u32,
        acquire: Result<AcquiredImage, FrameErrorKind>,
        /// Fence signals on the nth wait call (1-based); `None` never signals.
        fence_signals_on: Option<u32>,
        present_status: PresentStatus,
        events: Vec<Event>,
        commands: Vec<Command>,
        fence_waits: u32,
    }

    impl FakeBackend {
        fn healthy(image_count: u32) -> Self {
            Self {
                image_count,
                acquire: Ok(AcquiredImage {
                    index: 0,
                    suboptimal: false,
                }),
                fence_signals_on: Some(1),
                present_status: PresentStatus::Optimal,
                events: Vec::new(),
                commands: Vec::new(),
                fence_waits: 0,
            }
        }

        fn acquiring(mut self, index: u32, suboptimal: bool) -> Self {
            self.acquire = Ok(AcquiredImage { index, suboptimal });
            self
        }

        fn acquire_failing(mut self, kind: FrameErrorKind) -> Self {
            self.acquire = Err(kind);
            self
        }

        fn fence_never_signals(mut self) -> Self {
            self.fence_signals_on = None;
            self
        }

        fn fence_signals_on(mut self, nth: u32) -> Self {
            self.fence_signals_on = Some(nth);
            self
        }

        fn presenting(mut self, status: PresentStatus) -> Self {
            self.present_status = status;
            self
        }
    }

    impl FrameBackend for FakeBackend {
        fn image_count(&self) -> u32 {
            self.image_count
        }

        fn acquire_image(&mut self, _timeout_ns: u64) -> Result<AcquiredImage, FrameError> {
            self.events.push(Event::Acquire);
            match self.acquire {
                Ok(acquired) => Ok(acquired),
                Err(FrameErrorKind::AcquireTimeout) => Err(FrameError::AcquireTimeout),
                Err(FrameErrorKind::SurfaceLost) => Err(FrameError::SurfaceLost),
                Err(kind) => panic!("unsupported scripted acquire failure {kind:?}"),
            }
        }

        fn record(&mut self, image_index: u32, request: &FrameRequest) -> Result<(), FrameError> {
            self.events.push(Event::Record(image_index));
            self.commands.push(Command::BeginPass {
                clear_color: request.clear_color,
                clear_depth: request.clear_depth,
            });
            self.commands.push(Command::BindPipeline);
            self.commands.push(Command::BindDescriptorSet);
            self.commands.push(Command::BindVertexBuffer);
            self.commands.push(Command::SetViewport);
            self.commands.push(Command::SetScissor);
            for draw in &request.draws {
                self.commands.push(Command::Draw {
                    vertex_count: draw.vertex_count,
                    instance_count: draw.instance_count,
                });
            }
            self.commands.push(Command::EndPass);
            Ok(())
        }

        fn submit(&mut self, image_index: u32) -> Result<(), FrameError> {
            self.events.push(Event::Submit(image_index));
            Ok(())
        }

        fn wait_render_fence(&mut self, _timeout_ns: u64) -> Result<FenceStatus, FrameError> {
            self.events.push(Event::WaitFence);
            self.fence_waits += 1;
            match self.fence_signals_on {
                Some(nth) if self.fence_waits >= nth => Ok(FenceStatus::Signaled),
                _ => Ok(FenceStatus::TimedOut),
            }
        }

        fn present(&mut self, image_index: u32) -> Result<PresentStatus, FrameError> {
            self.events.push(Event::Present(image_index));
            Ok(self.present_status)
        }

        fn wait_idle(&mut self) -> Result<(), FrameError> {
            self.events.push(Event::WaitIdle);
            Ok(())
        }
    }

    const TIMEOUT_NS: u64 = 1_000_000;

    fn cube_request() -> FrameRequest {
        let area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
        };
        FrameRequest::new(area)
            .with_clear_color([0.3, 0.2, 0.2, 0.2])
            .with_clear_depth(1.0)
            .with_draw(DrawCall::new(36))
    }

    #[test]
    fn healthy_surface_returns_success() {
        let mut driver = FrameDriver::new(FakeBackend::healthy(2));
        let outcome = driver.submit_frame(&cube_request(), TIMEOUT_NS).unwrap();
        assert_eq!(outcome, FrameOutcome::Success);
        assert_eq!(driver.phase(), FramePhase::Idle);
        assert_eq!(
            driver.backend().events,
            vec![
                Event::Acquire,
                Event::Record(0),
                Event::Submit(0),
                Event::WaitFence,
                Event::Present(0),
            ]
        );
    }

    #[test]
    fn acquired_index_flows_to_record_submit_and_present() {
        let mut driver = FrameDriver::new(FakeBackend::healthy(3).acquiring(2, false));
        driver.submit_frame(&cube_request(), TIMEOUT_NS).unwrap();
        let events = &driver.backend().events;
        assert!(events.contains(&Event::Record(2)));
        assert!(events.contains(&Event::Submit(2)));
        assert!(events.contains(&Event::Present(2)));
    }

    #[test]
    fn out_of_range_index_is_rejected_before_recording() {
        let mut driver = FrameDriver::new(FakeBackend::healthy(2).acquiring(5, false));
        let err = driver
            .submit_frame(&cube_request(), TIMEOUT_NS)
            .unwrap_err();
        assert!(matches!(
            err,
            FrameError::InvalidImageIndex {
                index: 5,
                image_count: 2
            }
        ));
        assert_eq!(
            driver.phase(),
            FramePhase::Failed(FrameErrorKind::InvalidImageIndex)
        );
        // Nothing was recorded against a mismatched target.
        assert_eq!(driver.backend().events, vec![Event::Acquire]);
        assert!(driver.backend().commands.is_empty());
    }

    #[test]
    fn fence_timeout_with_no_retries_is_render_timeout() {
        let mut driver = FrameDriver::new(FakeBackend::healthy(2).fence_never_signals());
        let err = driver
            .submit_frame(&cube_request(), TIMEOUT_NS)
            .unwrap_err();
        assert!(matches!(err, FrameError::RenderTimeout { attempts: 1 }));
        // The frame was never presented.
        assert!(!driver.backend().events.iter().any(|e| matches!(e, Event::Present(_))));
    }

    #[test]
    fn fence_retry_budget_is_bounded() {
        let mut driver =
            FrameDriver::new(FakeBackend::healthy(2).fence_never_signals()).with_wait_retries(3);
        let err = driver
            .submit_frame(&cube_request(), TIMEOUT_NS)
            .unwrap_err();
        assert!(matches!(err, FrameError::RenderTimeout { attempts: 4 }));
        assert_eq!(driver.backend().fence_waits, 4);
    }

    #[test]
    fn fence_signal_within_budget_succeeds() {
        let mut driver =
            FrameDriver::new(FakeBackend::healthy(2).fence_signals_on(2)).with_wait_retries(2);
        let outcome = driver.submit_frame(&cube_request(), TIMEOUT_NS).unwrap();
        assert_eq!(outcome, FrameOutcome::Success);
        assert_eq!(driver.backend().fence_waits, 2);
    }

    #[test]
    fn suboptimal_present_is_an_outcome_not_an_error() {
        let mut driver =
            FrameDriver::new(FakeBackend::healthy(2).presenting(PresentStatus::Suboptimal));
        let outcome = driver.submit_frame(&cube_request(), TIMEOUT_NS).unwrap();
        assert_eq!(outcome, FrameOutcome::Suboptimal);
        assert_eq!(driver.phase(), FramePhase::Idle);
    }

    #[test]
    fn suboptimal_acquire_is_reported_after_present() {
        let mut driver = FrameDriver::new(FakeBackend::healthy(2).acquiring(1, true));
        let outcome = driver.submit_frame(&cube_request(), TIMEOUT_NS).unwrap();
        assert_eq!(outcome, FrameOutcome::Suboptimal);
        // Still presented, with the acquired index.
        assert!(driver.backend().events.contains(&Event::Present(1)));
    }

    #[test]
    fn acquire_timeout_surfaces_to_caller() {
        let mut driver = FrameDriver::new(
            FakeBackend::healthy(2).acquire_failing(FrameErrorKind::AcquireTimeout),
        );
        let err = driver
            .submit_frame(&cube_request(), TIMEOUT_NS)
            .unwrap_err();
        assert!(matches!(err, FrameError::AcquireTimeout));
        assert_eq!(
            driver.phase(),
            FramePhase::Failed(FrameErrorKind::AcquireTimeout)
        );
    }

    #[test]
    fn surface_lost_is_not_retried() {
        let mut driver =
            FrameDriver::new(FakeBackend::healthy(2).acquire_failing(FrameErrorKind::SurfaceLost));
        let err = driver
            .submit_frame(&cube_request(), TIMEOUT_NS)
            .unwrap_err();
        assert!(matches!(err, FrameError::SurfaceLost));
        // Exactly one acquire attempt; recreation is the caller's job.
        assert_eq!(driver.backend().events, vec![Event::Acquire]);
    }

    #[test]
    fn one_shot_cube_frame_records_single_pass() {
        let mut driver = FrameDriver::new(FakeBackend::healthy(2));
        let outcome = driver.submit_frame(&cube_request(), TIMEOUT_NS).unwrap();
        assert_eq!(outcome, FrameOutcome::Success);

        let commands = &driver.backend().commands;
        let begins = commands
            .iter()
            .filter(|c| matches!(c, Command::BeginPass { .. }))
            .count();
        let ends = commands
            .iter()
            .filter(|c| matches!(c, Command::EndPass))
            .count();
        assert_eq!(begins, 1);
        assert_eq!(ends, 1);

        assert_eq!(
            commands[0],
            Command::BeginPass {
                clear_color: [0.3, 0.2, 0.2, 0.2],
                clear_depth: 1.0,
            }
        );
        assert_eq!(*commands.last().unwrap(), Command::EndPass);

        let draws: Vec<_> = commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .collect();
        assert_eq!(draws.len(), 1);
        assert_eq!(
            *draws[0],
            Command::Draw {
                vertex_count: 36,
                instance_count: 1,
            }
        );
    }

    #[test]
    fn wait_idle_reaches_the_backend() {
        let mut driver = FrameDriver::new(FakeBackend::healthy(2));
        driver.submit_frame(&cube_request(), TIMEOUT_NS).unwrap();
        driver.wait_idle().unwrap();
        assert_eq!(*driver.backend().events.last().unwrap(), Event::WaitIdle);
    }
}
