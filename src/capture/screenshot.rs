//! Window capture through the Windows Graphics Capture API.

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use std::sync::mpsc;
use std::time::Duration;

use windows::core::Interface;
use windows::Foundation::TypedEventHandler;
use windows::Graphics::Capture::{Direct3D11CaptureFramePool, GraphicsCaptureItem};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Resource, ID3D11Texture2D,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ,
    D3D11_MAPPED_SUBRESOURCE, D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::Graphics::Dxgi::IDXGIDevice;
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;
use windows::Win32::System::WinRT::RoGetActivationFactory;

use super::window::{client_offset, client_size};

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Capture state for one window. The D3D device and capture item live as
/// long as the capturer; each `grab` opens a short-lived frame pool.
pub struct WindowCapturer {
    hwnd: HWND,
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    winrt_device: IDirect3DDevice,
    item: GraphicsCaptureItem,
}

impl WindowCapturer {
    pub fn new(hwnd: HWND) -> Result<Self> {
        let (device, context) = hardware_device()?;
        let winrt_device = winrt_device(&device)?;
        let item = capture_item_for(hwnd)?;
        Ok(Self {
            hwnd,
            device,
            context,
            winrt_device,
            item,
        })
    }

    /// Captures one frame cropped to the client area.
    pub fn grab(&self) -> Result<RgbaImage> {
        let pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &self.winrt_device,
            DirectXPixelFormat::B8G8R8A8UIntNormalized,
            1,
            self.item.Size()?,
        )?;
        let session = pool.CreateCaptureSession(&self.item)?;

        let (tx, rx) = mpsc::sync_channel::<()>(1);
        pool.FrameArrived(&TypedEventHandler::new(
            move |_: &Option<Direct3D11CaptureFramePool>, _| {
                let _ = tx.try_send(());
                Ok(())
            },
        ))?;

        session.StartCapture()?;
        let image = match rx.recv_timeout(FRAME_TIMEOUT) {
            Ok(()) => self.latest_frame(&pool),
            Err(_) => Err(anyhow!(
                "No frame from the game window within {:?}",
                FRAME_TIMEOUT
            )),
        };

        let _ = session.Close();
        let _ = pool.Close();
        image
    }

    fn latest_frame(&self, pool: &Direct3D11CaptureFramePool) -> Result<RgbaImage> {
        let frame = pool.TryGetNextFrame()?;
        let access: IDirect3DDxgiInterfaceAccess = frame.Surface()?.cast()?;
        let texture: ID3D11Texture2D = unsafe { access.GetInterface()? };
        self.read_client_area(&texture)
    }

    /// Copies the frame texture into CPU memory and converts the client area
    /// from BGRA.
    fn read_client_area(&self, texture: &ID3D11Texture2D) -> Result<RgbaImage> {
        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };

        let staging = self.staging_copy(texture, &desc)?;
        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe {
            self.context
                .Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
                .context("Failed to map captured frame")?;
        }

        let offset = client_offset(self.hwnd)?;
        let (width, height) = client_size(self.hwnd)?;
        let left = (offset.x.max(0) as u32).min(desc.Width);
        let top = (offset.y.max(0) as u32).min(desc.Height);
        let copy_width = width.min(desc.Width - left) as usize;
        let copy_height = height.min(desc.Height - top);

        let pitch = mapped.RowPitch as usize;
        let frame = unsafe {
            std::slice::from_raw_parts(mapped.pData as *const u8, pitch * desc.Height as usize)
        };

        let mut image = RgbaImage::new(width, height);
        let stride = width as usize * 4;
        let pixels: &mut [u8] = &mut image;
        for y in 0..copy_height {
            let start = (top + y) as usize * pitch + left as usize * 4;
            let src = &frame[start..start + copy_width * 4];
            let row = y as usize * stride;
            let dst = &mut pixels[row..row + copy_width * 4];
            for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
                d.copy_from_slice(&[s[2], s[1], s[0], s[3]]);
            }
        }

        unsafe { self.context.Unmap(&staging, 0) };
        Ok(image)
    }

    /// CPU-readable copy of a GPU texture.
    fn staging_copy(
        &self,
        texture: &ID3D11Texture2D,
        desc: &D3D11_TEXTURE2D_DESC,
    ) -> Result<ID3D11Resource> {
        let staging_desc = D3D11_TEXTURE2D_DESC {
            MipLevels: 1,
            ArraySize: 1,
            Usage: D3D11_USAGE_STAGING,
            BindFlags: Default::default(),
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: Default::default(),
            ..*desc
        };

        let mut staging: Option<ID3D11Texture2D> = None;
        unsafe {
            self.device
                .CreateTexture2D(&staging_desc, None, Some(&mut staging))?;
        }
        let staging: ID3D11Resource = staging
            .ok_or_else(|| anyhow!("Staging texture was not created"))?
            .cast()?;
        unsafe {
            self.context
                .CopyResource(&staging, &texture.cast::<ID3D11Resource>()?);
        }
        Ok(staging)
    }
}

fn hardware_device() -> Result<(ID3D11Device, ID3D11DeviceContext)> {
    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;
    unsafe {
        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            None,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )
        .context("D3D11CreateDevice failed")?;
    }
    match (device, context) {
        (Some(device), Some(context)) => Ok((device, context)),
        _ => Err(anyhow!("D3D11CreateDevice returned no device")),
    }
}

/// Wraps the D3D11 device as the WinRT device the capture API expects.
fn winrt_device(device: &ID3D11Device) -> Result<IDirect3DDevice> {
    let dxgi: IDXGIDevice = device.cast()?;
    let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi)? };
    Ok(inspectable.cast()?)
}

fn capture_item_for(hwnd: HWND) -> Result<GraphicsCaptureItem> {
    let interop: IGraphicsCaptureItemInterop = unsafe {
        RoGetActivationFactory(windows::core::h!(
            "Windows.Graphics.Capture.GraphicsCaptureItem"
        ))
        .context("Graphics Capture is not available")?
    };
    unsafe { interop.CreateForWindow(hwnd) }.context("Game window cannot be captured")
}
